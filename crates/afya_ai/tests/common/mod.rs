#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use afya_ai::{
    Conversation, Message, ProviderClient, ProviderError, ProviderFactory, ProviderIdentity,
};
use async_trait::async_trait;
use reqwest::StatusCode;

/// What a scripted provider does on every call.
#[derive(Clone)]
pub enum Behavior {
    Reply(&'static str),
    Http(u16, &'static str),
    TimesOut,
    EmptyConversation,
    Hang,
    Delay(Duration, &'static str),
}

/// In-process provider that follows a fixed script and counts its calls.
pub struct ScriptedProvider {
    identity: ProviderIdentity,
    behavior: Behavior,
    timeout: Duration,
    calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(identity: ProviderIdentity, behavior: Behavior) -> Self {
        Self {
            identity,
            behavior,
            timeout: Duration::from_secs(60),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn identity(&self) -> ProviderIdentity {
        self.identity
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn complete(&self, _conversation: &Conversation) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Reply(text) => Ok(text.to_string()),
            Behavior::Http(status, message) => Err(ProviderError::Http {
                status: StatusCode::from_u16(*status).unwrap(),
                message: message.to_string(),
            }),
            Behavior::TimesOut => Err(ProviderError::Timeout),
            Behavior::EmptyConversation => Err(ProviderError::EmptyConversation),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Err(ProviderError::Cancelled)
            }
            Behavior::Delay(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(text.to_string())
            }
        }
    }
}

/// Factory handing out one shared provider, counting constructions.
pub fn factory_for(
    provider: ScriptedProvider,
    constructions: Arc<AtomicUsize>,
) -> (ProviderIdentity, ProviderFactory) {
    let identity = provider.identity;
    let provider: Arc<dyn ProviderClient> = Arc::new(provider);
    let factory: ProviderFactory = Box::new(move || {
        constructions.fetch_add(1, Ordering::SeqCst);
        Ok(provider.clone())
    });
    (identity, factory)
}

/// Shorthand for a factory whose constructions are not observed.
pub fn factory(provider: ScriptedProvider) -> (ProviderIdentity, ProviderFactory) {
    factory_for(provider, Arc::new(AtomicUsize::new(0)))
}

pub fn total_chws() -> Conversation {
    Conversation::new(vec![Message::user("Show total CHWs")])
}
