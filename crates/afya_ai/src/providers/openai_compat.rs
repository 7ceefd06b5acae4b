//! Shared wire handling for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Both Groq and the Hugging Face router speak this dialect:
//!
//! ```text
//! POST {base}/chat/completions
//! {"model":"...","messages":[{"role":"user","content":"..."}],"stream":false}
//! ```
//!
//! Error payloads differ between the two (`{"error":{"message":..}}` vs
//! `{"error":".."}`); [`normalize_error_body`] reduces both to one string.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProviderError;
use crate::types::Conversation;

/// Error bodies longer than this are truncated before classification.
const MAX_ERROR_LEN: usize = 500;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Non-streaming response. `choices` defaults to empty so a body without
/// it is reported as [`ProviderError::NoChoices`] rather than a parse error.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Detailed {
        message: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    },
    Plain(String),
}

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

/// Convert a conversation to wire messages, dropping blank turns and keeping
/// the relative order of the rest.
pub(crate) fn convert_messages(conversation: &Conversation) -> Vec<WireMessage> {
    conversation
        .messages()
        .iter()
        .filter(|m| !m.is_blank())
        .map(|m| WireMessage {
            role: m.role.as_str().to_string(),
            content: m.text.clone(),
        })
        .collect()
}

/// Build a request body, refusing conversations with nothing to send.
pub(crate) fn build_request(
    conversation: &Conversation,
    model: &str,
    max_tokens: u32,
    temperature: f32,
) -> Result<ChatCompletionRequest, ProviderError> {
    if conversation.is_empty() {
        return Err(ProviderError::EmptyConversation);
    }
    let messages = convert_messages(conversation);
    if messages.is_empty() {
        return Err(ProviderError::EmptyConversation);
    }
    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages,
        stream: false,
        max_tokens: Some(max_tokens),
        temperature: Some(temperature),
    })
}

/// Issue exactly one POST to `{base_url}/chat/completions`.
pub(crate) async fn post_chat_completion(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    body: &ChatCompletionRequest,
) -> Result<String, ProviderError> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let resp = client
        .post(&url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(map_transport_error)?;

    read_completion(resp).await
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

/// Extract the first choice's text, or a normalized error.
pub(crate) async fn read_completion(resp: reqwest::Response) -> Result<String, ProviderError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            status,
            message: normalize_error_body(&text),
        });
    }

    let data: ChatCompletionResponse = resp.json().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Malformed(e.to_string())
        }
    })?;

    if let Some(model) = &data.model {
        debug!(model = %model, choices = data.choices.len(), "Completion received");
    }

    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::NoChoices)?;

    Ok(choice.message.content.unwrap_or_default().trim().to_string())
}

/// Reduce a provider error body to a single line of text.
pub(crate) fn normalize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    let text = match serde_json::from_str::<ErrorEnvelope>(trimmed) {
        Ok(ErrorEnvelope {
            error: ErrorPayload::Detailed { message, kind },
        }) => match kind {
            Some(kind) => format!("{message} ({kind})"),
            None => message,
        },
        Ok(ErrorEnvelope {
            error: ErrorPayload::Plain(message),
        }) => message,
        Err(_) => trimmed.to_string(),
    };

    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > MAX_ERROR_LEN {
        single_line.chars().take(MAX_ERROR_LEN).collect()
    } else {
        single_line
    }
}

fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
