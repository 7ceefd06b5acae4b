//! Hugging Face Inference provider (stable, higher limits, slower).
//!
//! Uses the OpenAI-compatible chat completions endpoint of the Hugging Face
//! router. Hosted models can take a while to load, hence the longer
//! default timeout.

use std::time::Duration;

use afya_core::AfyaConfig;
use afya_core::config::ENV_HF_API_KEY;
use async_trait::async_trait;
use tracing::{debug, info};

use super::openai_compat;
use super::{ProviderClient, ProviderError};
use crate::types::{Conversation, ProviderIdentity};

/// Hugging Face Inference provider. Fills the [`ProviderIdentity::Stable`]
/// slot.
pub struct HuggingFaceProvider {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    /// Build the provider from configuration. Fails when `HF_API_KEY` was
    /// not provided.
    pub fn from_config(config: &AfyaConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .huggingface_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(ProviderError::MissingCredential(ENV_HF_API_KEY))?;

        let timeout = Duration::from_secs(config.huggingface_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Build(e.to_string()))?;

        info!(model = %config.huggingface_model, "Hugging Face client initialized");

        Ok(Self {
            api_key,
            model: config.huggingface_model.clone(),
            base_url: config.huggingface_base_url.clone(),
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
impl ProviderClient for HuggingFaceProvider {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Stable
    }

    fn name(&self) -> &str {
        "Hugging Face"
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
            "Calling Hugging Face"
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
            huggingface_api_key: key.map(String::from),
            huggingface_base_url: "http://127.0.0.1:9".into(),
            huggingface_timeout_secs: 2,
            ..Default::default()
        }
    }

    #[test]
    fn missing_key_fails_construction() {
        let err = HuggingFaceProvider::from_config(&config_with_key(None))
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingCredential(ENV_HF_API_KEY)));
    }

    #[test]
    fn provider_metadata() {
        let provider = HuggingFaceProvider::from_config(&config_with_key(Some("hf_test"))).unwrap();
        assert_eq!(provider.identity(), ProviderIdentity::Stable);
        assert_eq!(provider.name(), "Hugging Face");
        assert_eq!(provider.model(), "mistralai/Mixtral-8x7B-Instruct-v0.1");
    }

    #[test]
    fn default_timeout_is_longer_than_groq() {
        let config = AfyaConfig::default();
        assert!(config.huggingface_timeout_secs > config.groq_timeout_secs);
    }

    #[tokio::test]
    async fn whitespace_only_conversation_never_reaches_network() {
        let provider = HuggingFaceProvider::from_config(&config_with_key(Some("hf_test"))).unwrap();
        let conv = Conversation::new(vec![Message::user("   "), Message::assistant("\n")]);
        let err = provider.complete(&conv).await.unwrap_err();
        assert_eq!(err.failure_class(), FailureClass::TransportError);
    }
}
