//! OpenAI backend: Responses API first, Chat Completions as fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::http::send_json;
use super::{PromptRequest, ProviderError, ProviderKind, Role, TextProvider};

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ────────────────────────────────────────────────────────────────────────────
// Chat Completions wire types (shared with the Hugging Face router)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct WireMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    pub fn text(&self) -> Option<String> {
        let content = self.choices.first()?.message.as_ref()?.content.as_deref()?;
        (!content.trim().is_empty()).then(|| content.to_string())
    }
}

/// System instruction as a `system` message followed by the conversation.
pub fn to_wire_messages(request: &PromptRequest) -> Vec<WireMessage<'_>> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        messages.push(WireMessage {
            role: "system",
            content: &request.system,
        });
    }
    messages.extend(request.messages.iter().map(|m| WireMessage {
        role: match m.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &m.content,
    }));
    messages
}

// ────────────────────────────────────────────────────────────────────────────
// Responses API wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsesResponse {
    pub output_text: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub text: Option<String>,
    #[serde(default)]
    pub content: Vec<OutputItem>,
}

impl ResponsesResponse {
    /// `output_text` when present, else every `output_text` item, including those
    /// nested inside `message` items.
    pub fn text(&self) -> Option<String> {
        if let Some(text) = self.output_text.as_deref().filter(|t| !t.trim().is_empty()) {
            return Some(text.to_string());
        }
        let mut text = String::new();
        collect_output_text(&self.output, &mut text);
        (!text.trim().is_empty()).then_some(text)
    }
}

fn collect_output_text(items: &[OutputItem], out: &mut String) {
    for item in items {
        if item.item_type == "output_text" {
            if let Some(t) = &item.text {
                out.push_str(t);
            }
        }
        collect_output_text(&item.content, out);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    async fn via_responses(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: to_wire_messages(request),
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
        };
        let response: ResponsesResponse = send_json("OpenAI", || {
            self.client
                .post(RESPONSES_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        response.text().ok_or(ProviderError::EmptyContent)
    }

    async fn via_chat(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: to_wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let response: ChatCompletionResponse = send_json("OpenAI", || {
            self.client
                .post(CHAT_COMPLETIONS_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        response.text().ok_or(ProviderError::EmptyContent)
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        match self.via_responses(request).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(error = %e, model = %self.model, "Responses API failed, falling back to Chat Completions");
                self.via_chat(request).await
            }
        }
    }
}
