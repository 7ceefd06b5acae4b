use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for the dashboard's client layer.
///
/// Provider-level failures never surface as `AfyaError` during a completion
/// call; they are absorbed by the fallback cascade. The variants here cover
/// startup and bootstrap failures.
#[derive(Error, Debug)]
pub enum AfyaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of errors for logging and user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Invalid or missing configuration (e.g. no API credentials at all).
    ConfigError,
    /// Local system error (file I/O).
    SystemError,
}

impl AfyaError {
    /// Returns the broad error category for routing and display purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::ConfigError,
            Self::Io(_) => ErrorCategory::SystemError,
        }
    }

    /// Returns a user-friendly message (hides internal details).
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("Configuration issue: {msg}"),
            Self::Io(_) => "File error. Check disk space and permissions.".into(),
        }
    }
}
