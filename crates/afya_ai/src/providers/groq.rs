//! Groq provider (low-latency, rate-limited).
//!
//! Uses raw `reqwest` against Groq's OpenAI-compatible endpoint; wire
//! handling is shared with [`super::openai_compat`].

use std::time::Duration;

use afya_core::AfyaConfig;
use afya_core::config::ENV_GROQ_API_KEY;
use async_trait::async_trait;
use tracing::{debug, info};

use super::openai_compat;
use super::{ProviderClient, ProviderError};
use crate::types::{Conversation, ProviderIdentity};

/// Groq chat completions provider. Fills the [`ProviderIdentity::Fast`] slot.
pub struct GroqProvider {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl GroqProvider {
    /// Build the provider from configuration. Fails when `GROQ_API_KEY` was
    /// not provided.
    pub fn from_config(config: &AfyaConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .groq_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingCredential(ENV_GROQ_API_KEY))?;

        let timeout = Duration::from_secs(config.groq_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Build(e.to_string()))?;

        info!(model = %config.groq_model, "Groq client initialized");

        Ok(Self {
            api_key,
            model: config.groq_model.clone(),
            base_url: config.groq_base_url.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ProviderClient for GroqProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Fast
    }

    fn name(&self) -> &str {
        "Groq"
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, ProviderError> {
        let body = openai_compat::build_request(
            conversation,
            &self.model,
            self.max_tokens,
            self.temperature,
        )?;

        debug!(
            model = %self.model,
            messages = body.messages.len(),
            est_tokens = conversation.estimated_tokens(),
            "Calling Groq"
        );

        openai_compat::post_chat_completion(&self.client, &self.base_url, &self.api_key, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureClass, Message};

    fn config_with_key(key: Option<&str>) -> AfyaConfig {
        AfyaConfig {
            groq_api_key: key.map(String::from),
            // Unroutable so a stray network call fails fast.
            groq_base_url: "http://127.0.0.1:9".into(),
            groq_timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn missing_key_fails_construction() {
        let err = GroqProvider::from_config(&config_with_key(None)).err().unwrap();
        assert!(matches!(err, ProviderError::MissingCredential(ENV_GROQ_API_KEY)));
    }

    #[test]
    fn empty_key_fails_construction() {
        assert!(GroqProvider::from_config(&config_with_key(Some(""))).is_err());
    }

    #[test]
    fn provider_metadata() {
        let provider = GroqProvider::from_config(&config_with_key(Some("gsk_test"))).unwrap();
        assert_eq!(provider.identity(), ProviderIdentity::Fast);
        assert_eq!(provider.name(), "Groq");
        assert_eq!(provider.model(), "llama3-8b-8192");
        assert_eq!(provider.request_timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn empty_conversation_never_reaches_network() {
        let provider = GroqProvider::from_config(&config_with_key(Some("gsk_test"))).unwrap();
        let err = provider.complete(&Conversation::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::EmptyConversation));
        assert_eq!(err.failure_class(), FailureClass::TransportError);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let provider = GroqProvider::from_config(&config_with_key(Some("gsk_test"))).unwrap();
        let conv = Conversation::new(vec![Message::user("Show total CHWs")]);
        let err = provider.complete(&conv).await.unwrap_err();
        assert_eq!(err.failure_class(), FailureClass::TransportError);
    }
}
