//! Provider trait and implementations.
//!
//! Each provider module exposes a struct that implements [`ProviderClient`].
//! The cascade and router only ever see `Arc<dyn ProviderClient>`.

pub mod groq;
pub mod huggingface;
pub(crate) mod openai_compat;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::routing::{classify, classify_status};
use crate::types::{Conversation, FailureClass, ProviderIdentity};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that any provider may return.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Conversation is empty")]
    EmptyConversation,

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Build(String),

    #[error("Connection error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("No model result: response contained no choices")]
    NoChoices,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Diagnose this failure.
    ///
    /// Structured information wins; anything else goes through the string
    /// classifier on the normalized message.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::EmptyConversation | Self::Timeout | Self::Cancelled | Self::Network(_) => {
                FailureClass::TransportError
            }
            Self::NoChoices | Self::Malformed(_) => FailureClass::ModelError,
            Self::Http { status, message } => {
                classify_status(*status).unwrap_or_else(|| classify(message))
            }
            Self::MissingCredential(_) | Self::Build(_) => classify(&self.to_string()),
        }
    }

    /// Whether the request itself was at fault rather than the provider.
    pub fn is_request_fault(&self) -> bool {
        matches!(self, Self::EmptyConversation | Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Uniform interface over one completion backend.
///
/// Implementations make at most one network call per [`complete`] and never
/// retry internally; retrying is the cascade's job.
///
/// [`complete`]: ProviderClient::complete
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Which routing slot this provider fills.
    fn identity(&self) -> ProviderIdentity;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Upper bound for a single call. The cascade enforces it even if the
    /// underlying transport does not.
    fn request_timeout(&self) -> Duration {
        Duration::from_secs(120)
    }

    /// Produce the text of the first completion choice for `conversation`.
    async fn complete(&self, conversation: &Conversation) -> Result<String, ProviderError>;
}
