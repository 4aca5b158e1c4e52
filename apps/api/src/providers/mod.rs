//! Provider Gateway: the single point of entry for all LLM calls.
//!
//! No other module talks to Gemini, OpenAI or Hugging Face directly. Each
//! backend implements `TextProvider`; `ProviderGateway` owns the configured
//! chain (primary plus one fallback) and is carried in `AppState`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gateway;
pub mod gemini;
pub mod http;
pub mod huggingface;
pub mod openai;

pub use gateway::{GatewayError, Generated, ProviderGateway, ProviderStatus};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Provider returned empty content")]
    EmptyContent,
}

/// Backends known to the gateway. Serialized with the names the editor displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// Default precedence when `AI_PROVIDER` is not set.
    pub const PRECEDENCE: [ProviderKind; 3] = [
        ProviderKind::Gemini,
        ProviderKind::HuggingFace,
        ProviderKind::OpenAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Accepts the canonical names plus a few common spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "huggingface" | "hugging_face" | "hf" => Some(ProviderKind::HuggingFace),
            "openai" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Provider-neutral prompt: a system instruction plus a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl PromptRequest {
    /// One system instruction and one user turn.
    pub fn single(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            messages: vec![ChatMessage::user(user)],
            temperature,
            max_tokens: None,
        }
    }

    /// System and conversation flattened into one prompt, for text-completion APIs.
    pub fn flattened(&self) -> String {
        let mut parts = Vec::with_capacity(self.messages.len() + 1);
        if !self.system.is_empty() {
            parts.push(self.system.clone());
        }
        parts.extend(self.messages.iter().map(|m| m.content.clone()));
        parts.join("\n\n")
    }
}

/// A text-generation backend. Implement this to add a provider without touching
/// the gateway or any handler.
///
/// Carried in `ProviderGateway` as `Arc<dyn TextProvider>`.
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    async fn generate(&self, request: &PromptRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parse_and_display() {
        assert_eq!(ProviderKind::parse(" Gemini "), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("hf"), Some(ProviderKind::HuggingFace));
        assert_eq!(ProviderKind::parse("openai"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("claude"), None);
        assert_eq!(ProviderKind::HuggingFace.to_string(), "huggingface");
    }

    #[test]
    fn test_provider_kind_serializes_display_names() {
        let json = serde_json::to_string(&ProviderKind::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }

    #[test]
    fn test_flattened_prompt() {
        let req = PromptRequest::single("Sistem", "Topik: X", 0.4);
        assert_eq!(req.flattened(), "Sistem\n\nTopik: X");
    }

    #[test]
    fn test_chat_message_roles_deserialize() {
        let m: ChatMessage = serde_json::from_str(r#"{"role":"assistant","content":"hai"}"#).unwrap();
        assert_eq!(m, ChatMessage::assistant("hai"));
    }
}
