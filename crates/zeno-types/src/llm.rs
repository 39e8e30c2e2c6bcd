//! Provider-facing request types for Zeno.
//!
//! These types model the normalized shape every provider adapter consumes:
//! role/content messages, a generation request, the provider family a model
//! belongs to, and the error taxonomy adapters report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A role/content pair sent to a provider.
///
/// Built per turn from stored history plus the injected system instruction;
/// never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub role: MessageRole,
    pub content: String,
}

impl NormalizedMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// One streaming generation call against a single model.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    /// Oldest-first; at most one `system` entry, conventionally first.
    pub messages: Vec<NormalizedMessage>,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl GenerationRequest {
    /// Check the input constraints every adapter relies on.
    pub fn validate(&self) -> Result<(), LlmError> {
        if self.messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "request must contain at least one message".to_string(),
            ));
        }
        let system_count = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .count();
        if system_count > 1 {
            return Err(LlmError::InvalidRequest(format!(
                "request contains {system_count} system messages, at most one is allowed"
            )));
        }
        Ok(())
    }
}

/// Wire-protocol family a model is served through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// Unified chat-completion style API (`/chat/completions` with SSE deltas).
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    /// Google Gemini `streamGenerateContent` API.
    Gemini,
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFamily::OpenAiCompatible => write!(f, "openai_compatible"),
            ProviderFamily::Gemini => write!(f, "gemini"),
        }
    }
}

impl FromStr for ProviderFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "openrouter" => Ok(ProviderFamily::OpenAiCompatible),
            "gemini" | "google" => Ok(ProviderFamily::Gemini),
            other => Err(format!("unknown provider family: '{other}'")),
        }
    }
}

/// Errors reported by provider adapters.
///
/// Every variant is treated the same by the orchestrator: the attempt
/// fails and is retried or triggers fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no gateway registered for model '{0}'")]
    UnknownModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_roundtrip() {
        for role in [MessageRole::System, MessageRole::User, MessageRole::Assistant] {
            let parsed: MessageRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("model".parse::<MessageRole>().is_err());
    }

    #[test]
    fn test_provider_family_serde() {
        let json = serde_json::to_string(&ProviderFamily::OpenAiCompatible).unwrap();
        assert_eq!(json, "\"openai_compatible\"");
        let parsed: ProviderFamily = serde_json::from_str("\"gemini\"").unwrap();
        assert_eq!(parsed, ProviderFamily::Gemini);
        assert_eq!("google".parse::<ProviderFamily>().unwrap(), ProviderFamily::Gemini);
    }

    #[test]
    fn test_generation_request_validation() {
        let mut req = GenerationRequest {
            model: "m".to_string(),
            messages: vec![],
            max_output_tokens: 10,
            timeout: Duration::from_secs(1),
        };
        assert!(req.validate().is_err());

        req.messages = vec![NormalizedMessage::system("a"), NormalizedMessage::user("b")];
        assert!(req.validate().is_ok());

        req.messages.push(NormalizedMessage::system("c"));
        assert!(matches!(req.validate(), Err(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned status 429: slow down");
    }
}
