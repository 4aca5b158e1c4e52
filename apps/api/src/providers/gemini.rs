//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::send_json;
use super::{PromptRequest, ProviderError, ProviderKind, Role, TextProvider};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<PartOut<'a>>,
}

#[derive(Debug, Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{GEMINI_API_BASE}/{}:generateContent", self.model)
    }
}

/// Gemini has no system role: the instruction goes first as a user turn and
/// assistant turns become `model`.
fn to_contents(request: &PromptRequest) -> Vec<Content<'_>> {
    let mut contents = Vec::with_capacity(request.messages.len() + 1);
    if !request.system.is_empty() {
        contents.push(Content {
            role: "user",
            parts: vec![PartOut {
                text: &request.system,
            }],
        });
    }
    for message in &request.messages {
        contents.push(Content {
            role: match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            },
            parts: vec![PartOut {
                text: &message.content,
            }],
        });
    }
    contents
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &PromptRequest) -> Result<String, ProviderError> {
        let body = GenerateContentRequest {
            contents: to_contents(request),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };
        let url = self.endpoint();

        // Key travels in a header so it never appears in logged URLs.
        let response: GenerateContentResponse = send_json("Gemini", || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        response.text().ok_or(ProviderError::EmptyContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;

    #[test]
    fn test_to_contents_maps_roles_and_prepends_system() {
        let request = PromptRequest {
            system: "Anda asisten revisi".into(),
            messages: vec![ChatMessage::user("Perbaiki"), ChatMessage::assistant("Baik")],
            temperature: 0.3,
            max_tokens: None,
        };
        let json = serde_json::to_value(to_contents(&request)).unwrap();
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["parts"][0]["text"], "Anda asisten revisi");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[2]["role"], "model");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Satu "},{"text":"dua"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text().as_deref(), Some("Satu dua"));
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(resp.text(), None);
    }

    #[test]
    fn test_request_body_uses_camel_case() {
        let request = PromptRequest::single("s", "u", 0.4);
        let body = GenerateContentRequest {
            contents: to_contents(&request),
            generation_config: GenerationConfig {
                temperature: 0.4,
                max_output_tokens: None,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("generationConfig").is_some());
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }
}
