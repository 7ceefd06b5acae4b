use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
}

impl Message {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    /// Whether the message carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered sequence of messages. Turn order is significant.
///
/// Clients only ever receive `&Conversation`, so a conversation cannot be
/// modified once it has been handed to a completion call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Builder-style append.
    pub fn with(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the most recent user turn, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.text.as_str())
    }

    /// Rough token estimate: one token per four characters.
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.text.chars().count()).sum::<usize>() / 4
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self::new(messages)
    }
}

// ---------------------------------------------------------------------------
// Provider identity
// ---------------------------------------------------------------------------

/// Which backend served (or is meant to serve) a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderIdentity {
    /// Low-latency, rate-limited provider (Groq).
    Fast,
    /// Higher-limit, higher-latency provider (Hugging Face).
    Stable,
    /// No network; deterministic canned answers.
    Offline,
}

impl ProviderIdentity {
    pub const ALL: [ProviderIdentity; 3] = [Self::Fast, Self::Stable, Self::Offline];

    pub fn is_network(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fast => "fast",
            Self::Stable => "stable",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Operation category
// ---------------------------------------------------------------------------

/// Caller-supplied tag that biases provider ordering toward latency or
/// stability. It never affects conversation content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// System initialization, table and schema work.
    System,
    /// Interactive queries and chat.
    Interactive,
    /// Report, analysis and visualization generation.
    Report,
    /// Anything else.
    Default,
}

impl OperationCategory {
    /// Parse a category tag. Unknown tags map to [`OperationCategory::Default`].
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "system" | "initialization" | "table" | "schema" => Self::System,
            "query" | "interactive" | "chat" => Self::Interactive,
            "report" | "analysis" | "visualization" => Self::Report,
            _ => Self::Default,
        }
    }
}

impl From<&str> for OperationCategory {
    fn from(tag: &str) -> Self {
        Self::from_tag(tag)
    }
}

impl std::fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Interactive => "interactive",
            Self::Report => "report",
            Self::Default => "default",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Failure class
// ---------------------------------------------------------------------------

/// Diagnosis attached to every failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    RateLimited,
    ServerError,
    ModelError,
    TransportError,
    Unknown,
}

impl FailureClass {
    /// Whether the cascade should move on to the next provider.
    ///
    /// Every class is retryable under the current policy; the class exists
    /// for diagnosis and cooldown bookkeeping.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::ModelError => "model_error",
            Self::TransportError => "transport_error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// What a caller of the client layer receives.
///
/// `degraded` is derived from `provider_used`: it is `true` exactly when the
/// offline responder produced the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: String,
    pub provider_used: ProviderIdentity,
    pub degraded: bool,
}

impl CompletionResult {
    pub fn new(text: impl Into<String>, provider_used: ProviderIdentity) -> Self {
        Self {
            text: text.into(),
            provider_used,
            degraded: provider_used == ProviderIdentity::Offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_user_text_picks_most_recent_user_turn() {
        let conv = Conversation::default()
            .with(Message::system("You are a data analyst."))
            .with(Message::user("first question"))
            .with(Message::assistant("first answer"))
            .with(Message::user("second question"))
            .with(Message::assistant("second answer"));
        assert_eq!(conv.last_user_text(), Some("second question"));
    }

    #[test]
    fn last_user_text_none_without_user_turns() {
        let conv = Conversation::new(vec![Message::system("boot")]);
        assert_eq!(conv.last_user_text(), None);
    }

    #[test]
    fn category_aliases() {
        assert_eq!(OperationCategory::from_tag("schema"), OperationCategory::System);
        assert_eq!(OperationCategory::from_tag("chat"), OperationCategory::Interactive);
        assert_eq!(OperationCategory::from_tag("Query"), OperationCategory::Interactive);
        assert_eq!(
            OperationCategory::from_tag("visualization"),
            OperationCategory::Report
        );
        assert_eq!(OperationCategory::from_tag("fallback"), OperationCategory::Default);
        assert_eq!(OperationCategory::from_tag(""), OperationCategory::Default);
    }

    #[test]
    fn degraded_follows_provider() {
        assert!(CompletionResult::new("x", ProviderIdentity::Offline).degraded);
        assert!(!CompletionResult::new("x", ProviderIdentity::Fast).degraded);
        assert!(!CompletionResult::new("x", ProviderIdentity::Stable).degraded);
    }

    #[test]
    fn estimated_tokens_quarter_of_chars() {
        let conv = Conversation::new(vec![Message::user("a".repeat(40))]);
        assert_eq!(conv.estimated_tokens(), 10);
    }

    #[test]
    fn identity_serializes_snake_case() {
        let json = serde_json::to_string(&ProviderIdentity::Offline).unwrap();
        assert_eq!(json, "\"offline\"");
        let class = serde_json::to_string(&FailureClass::RateLimited).unwrap();
        assert_eq!(class, "\"rate_limited\"");
    }

    #[test]
    fn conversation_is_transparent_in_json() {
        let conv = Conversation::new(vec![Message::user("hi")]);
        let json = serde_json::to_value(&conv).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["text"], "hi");
    }
}
