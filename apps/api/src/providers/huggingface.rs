//! Hugging Face backend.
//!
//! The router (`/v1/chat/completions`, OpenAI-compatible) is the default. The
//! legacy Inference API is still reachable via `HUGGING_FACE_API=inference`;
//! its several response shapes are normalized by `InferenceOutput`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{send_json, send_text};
use super::openai::{to_wire_messages, ChatCompletionRequest, ChatCompletionResponse};
use super::{PromptRequest, ProviderError, ProviderKind, TextProvider};

const ROUTER_URL: &str = "https://router.huggingface.co/v1/chat/completions";
const INFERENCE_API_BASE: &str = "https://api-inference.huggingface.co/models";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b:fireworks-ai";
const INFERENCE_MAX_NEW_TOKENS: u32 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HfApi {
    #[default]
    Router,
    Inference,
}

impl HfApi {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "inference" | "legacy" => HfApi::Inference,
            _ => HfApi::Router,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Inference API wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedItem {
    pub generated_text: Option<String>,
    pub translation_text: Option<String>,
}

impl GeneratedItem {
    fn text(&self) -> Option<&str> {
        self.generated_text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.translation_text.as_deref().filter(|t| !t.is_empty()))
    }
}

/// Every shape the Inference API has been seen to return.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InferenceOutput {
    List(Vec<GeneratedItem>),
    Single(GeneratedItem),
    Text(String),
}

impl InferenceOutput {
    pub fn text(&self) -> Option<String> {
        let text = match self {
            InferenceOutput::List(items) => items.first().and_then(GeneratedItem::text),
            InferenceOutput::Single(item) => item.text(),
            InferenceOutput::Text(s) => Some(s.as_str()),
        };
        text.filter(|t| !t.trim().is_empty()).map(str::to_string)
    }
}

/// Normalizes a raw Inference API body. Unrecognized JSON is returned verbatim
/// rather than dropped.
pub fn normalize_inference_body(body: &str) -> Result<String, ProviderError> {
    match serde_json::from_str::<InferenceOutput>(body) {
        Ok(output) => match output.text() {
            Some(text) => Ok(text),
            None if body.trim().is_empty() => Err(ProviderError::EmptyContent),
            None => Ok(body.trim().to_string()),
        },
        Err(_) if body.trim().is_empty() => Err(ProviderError::EmptyContent),
        Err(_) => Ok(body.trim().to_string()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    token: String,
    model: String,
    api: HfApi,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, token: String, model: String, api: HfApi) -> Self {
        Self {
            client,
            token,
            model,
            api,
        }
    }

    async fn via_router(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: to_wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let response: ChatCompletionResponse = send_json("HF router", || {
            self.client
                .post(ROUTER_URL)
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await?;
        response.text().ok_or(ProviderError::EmptyContent)
    }

    async fn via_inference(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        let body = InferenceRequest {
            inputs: request.flattened(),
            parameters: InferenceParameters {
                max_new_tokens: request.max_tokens.unwrap_or(INFERENCE_MAX_NEW_TOKENS),
                temperature: request.temperature,
                return_full_text: false,
            },
            options: InferenceOptions {
                wait_for_model: true,
            },
        };
        let url = format!("{INFERENCE_API_BASE}/{}", self.model);
        let raw = send_text("HF", || {
            self.client
                .post(&url)
                .bearer_auth(&self.token)
                .json(&body)
        })
        .await?;
        normalize_inference_body(&raw)
    }
}

#[async_trait]
impl TextProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        match self.api {
            HfApi::Router => self.via_router(request).await,
            HfApi::Inference => self.via_inference(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_generated_text_list() {
        let text = normalize_inference_body(r#"[{"generated_text":"Makalah"}]"#).unwrap();
        assert_eq!(text, "Makalah");
    }

    #[test]
    fn test_normalize_single_object() {
        let text = normalize_inference_body(r#"{"generated_text":"Satu"}"#).unwrap();
        assert_eq!(text, "Satu");
    }

    #[test]
    fn test_normalize_bare_string() {
        let text = normalize_inference_body(r#""teks polos""#).unwrap();
        assert_eq!(text, "teks polos");
    }

    #[test]
    fn test_normalize_translation_text() {
        let text = normalize_inference_body(r#"[{"translation_text":"Terjemahan"}]"#).unwrap();
        assert_eq!(text, "Terjemahan");
    }

    #[test]
    fn test_normalize_unknown_shape_passes_through() {
        let body = r#"{"summary":"x"}"#;
        assert_eq!(normalize_inference_body(body).unwrap(), body);
    }

    #[test]
    fn test_normalize_empty_body_is_error() {
        assert!(matches!(
            normalize_inference_body("  "),
            Err(ProviderError::EmptyContent)
        ));
    }

    #[test]
    fn test_hf_api_parse() {
        assert_eq!(HfApi::parse("inference"), HfApi::Inference);
        assert_eq!(HfApi::parse(""), HfApi::Router);
    }
}
