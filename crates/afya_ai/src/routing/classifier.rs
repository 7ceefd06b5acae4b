//! Failure classification.
//!
//! A heuristic over free-text error messages: providers report failures as
//! strings of varying shape, so the message is lower-cased and matched
//! against an ordered rule table. The first rule with a matching phrase
//! wins. Callers holding a structured status code should consult
//! [`classify_status`] first (see `ProviderError::failure_class`).

use reqwest::StatusCode;

use crate::types::FailureClass;

/// Ordered rule table. Earlier rows take priority.
static RULES: &[(FailureClass, &[&str])] = &[
    (
        FailureClass::RateLimited,
        &["429", "rate limit", "too many requests", "quota exceeded"],
    ),
    (
        FailureClass::ServerError,
        &[
            "500",
            "internal server error",
            "service unavailable",
            "bad gateway",
            "gateway timeout",
            "server error",
        ],
    ),
    (
        FailureClass::ModelError,
        &["no model result", "assertion", "model result was produced"],
    ),
    (
        FailureClass::TransportError,
        &["timeout", "timed out", "connection error"],
    ),
];

/// Map an error message to a [`FailureClass`] (case-insensitive).
pub fn classify(error_text: &str) -> FailureClass {
    let lower = error_text.to_lowercase();
    RULES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(class, _)| *class)
        .unwrap_or(FailureClass::Unknown)
}

/// Structured diagnosis from an HTTP status, when the status alone is
/// conclusive.
pub fn classify_status(status: StatusCode) -> Option<FailureClass> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(FailureClass::RateLimited)
    } else if status == StatusCode::REQUEST_TIMEOUT {
        Some(FailureClass::TransportError)
    } else if status.is_server_error() {
        Some(FailureClass::ServerError)
    } else {
        None
    }
}
