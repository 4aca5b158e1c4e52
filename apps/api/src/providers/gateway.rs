//! Provider selection and fallback.
//!
//! The chain is built once at startup from configuration: every backend with a
//! key, ordered by precedence (Gemini, Hugging Face, OpenAI unless `AI_PROVIDER`
//! names another first), truncated to a primary and one fallback.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::gemini::GeminiProvider;
use super::huggingface::{HfApi, HuggingFaceProvider};
use super::openai::OpenAiProvider;
use super::{PromptRequest, ProviderError, ProviderKind, TextProvider};
use crate::config::Config;

pub const MISSING_PROVIDER_MESSAGE: &str =
    "Missing AI provider key: set GOOGLE_API_KEY, HUGGING_FACE_TOKEN or OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing AI provider key: set GOOGLE_API_KEY, HUGGING_FACE_TOKEN or OPENAI_API_KEY")]
    NotConfigured,

    /// Reported against the primary provider even when the fallback also failed.
    #[error("{source}")]
    Failed {
        provider: ProviderKind,
        model: String,
        #[source]
        source: ProviderError,
    },
}

/// Successful generation, tagged with the backend that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    pub provider: ProviderKind,
    pub model: String,
}

/// Health-check view of the gateway. Never carries secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub ok: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Clone, Default)]
pub struct ProviderGateway {
    chain: Vec<Arc<dyn TextProvider>>,
}

impl ProviderGateway {
    /// Builds from an explicit chain; only the first two entries are used.
    pub fn new(mut chain: Vec<Arc<dyn TextProvider>>) -> Self {
        chain.truncate(2);
        Self { chain }
    }

    pub fn from_config(config: &Config, client: Client) -> Self {
        let order = precedence(config.ai_provider.as_deref());
        let mut chain: Vec<Arc<dyn TextProvider>> = Vec::new();

        for kind in order {
            match kind {
                ProviderKind::Gemini => {
                    if let Some(key) = &config.google_api_key {
                        chain.push(Arc::new(GeminiProvider::new(
                            client.clone(),
                            key.clone(),
                            config.google_model.clone(),
                        )));
                    }
                }
                ProviderKind::HuggingFace => {
                    if let Some(token) = &config.hugging_face_token {
                        chain.push(Arc::new(HuggingFaceProvider::new(
                            client.clone(),
                            token.clone(),
                            config.hugging_face_model.clone(),
                            HfApi::parse(&config.hugging_face_api),
                        )));
                    }
                }
                ProviderKind::OpenAi => {
                    if let Some(key) = &config.openai_api_key {
                        chain.push(Arc::new(OpenAiProvider::new(
                            client.clone(),
                            key.clone(),
                            config.openai_model.clone(),
                        )));
                    }
                }
            }
        }

        let gateway = Self::new(chain);
        match gateway.primary() {
            Some(p) => info!(
                provider = %p.kind(),
                model = p.model(),
                fallback = gateway.chain.get(1).map(|f| f.kind().as_str()).unwrap_or("none"),
                "Provider gateway initialized"
            ),
            None => warn!("No AI provider configured, AI endpoints will return an error"),
        }
        gateway
    }

    pub fn primary(&self) -> Option<&dyn TextProvider> {
        self.chain.first().map(|p| p.as_ref())
    }

    pub fn status(&self) -> ProviderStatus {
        match self.primary() {
            Some(p) => ProviderStatus {
                ok: true,
                provider: p.kind().as_str().to_string(),
                model: Some(p.model().to_string()),
            },
            None => ProviderStatus {
                ok: false,
                provider: "none".to_string(),
                model: None,
            },
        }
    }

    /// Calls the primary provider; on failure retries once against the fallback.
    pub async fn generate(&self, request: &PromptRequest) -> Result<Generated, GatewayError> {
        let primary = self.chain.first().ok_or(GatewayError::NotConfigured)?;

        let primary_error = match primary.generate(request).await {
            Ok(text) => {
                return Ok(Generated {
                    text,
                    provider: primary.kind(),
                    model: primary.model().to_string(),
                })
            }
            Err(e) => e,
        };

        if let Some(fallback) = self.chain.get(1) {
            warn!(
                primary = %primary.kind(),
                fallback = %fallback.kind(),
                error = %primary_error,
                "Primary provider failed, trying fallback"
            );
            match fallback.generate(request).await {
                Ok(text) => {
                    return Ok(Generated {
                        text,
                        provider: fallback.kind(),
                        model: fallback.model().to_string(),
                    })
                }
                Err(e) => warn!(provider = %fallback.kind(), error = %e, "Fallback provider failed"),
            }
        }

        Err(GatewayError::Failed {
            provider: primary.kind(),
            model: primary.model().to_string(),
            source: primary_error,
        })
    }
}

/// Provider order: the `AI_PROVIDER` override (when recognized) first, then the
/// default precedence.
pub fn precedence(preferred: Option<&str>) -> Vec<ProviderKind> {
    let mut order = ProviderKind::PRECEDENCE.to_vec();
    if let Some(kind) = preferred.and_then(ProviderKind::parse) {
        order.retain(|k| *k != kind);
        order.insert(0, kind);
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProvider {
        kind: ProviderKind,
        reply: Option<&'static str>,
        calls: AtomicU32,
    }

    impl FakeProvider {
        fn ok(kind: ProviderKind, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Some(reply),
                calls: AtomicU32::new(0),
            })
        }

        fn failing(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: None,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TextProvider for FakeProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn model(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, _request: &PromptRequest) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(r) => Ok(r.to_string()),
                None => Err(ProviderError::Api {
                    status: 401,
                    message: format!("{} rejected the key", self.kind),
                }),
            }
        }
    }

    fn as_dyn(p: &Arc<FakeProvider>) -> Arc<dyn TextProvider> {
        p.clone()
    }

    fn request() -> PromptRequest {
        PromptRequest::single("sys", "user", 0.4)
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_errors() {
        let gateway = ProviderGateway::default();
        let err = gateway.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
        assert_eq!(err.to_string(), MISSING_PROVIDER_MESSAGE);
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = FakeProvider::ok(ProviderKind::Gemini, "dari gemini");
        let fallback = FakeProvider::ok(ProviderKind::OpenAi, "dari openai");
        let gateway = ProviderGateway::new(vec![as_dyn(&primary), as_dyn(&fallback)]);
        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out.text, "dari gemini");
        assert_eq!(out.provider, ProviderKind::Gemini);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_primary_uses_fallback_once() {
        let primary = FakeProvider::failing(ProviderKind::Gemini);
        let fallback = FakeProvider::ok(ProviderKind::HuggingFace, "dari hf");
        let gateway = ProviderGateway::new(vec![as_dyn(&primary), as_dyn(&fallback)]);
        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out.provider, ProviderKind::HuggingFace);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_failing_reports_primary() {
        let gateway = ProviderGateway::new(vec![
            as_dyn(&FakeProvider::failing(ProviderKind::HuggingFace)),
            as_dyn(&FakeProvider::failing(ProviderKind::OpenAi)),
        ]);
        match gateway.generate(&request()).await.unwrap_err() {
            GatewayError::Failed {
                provider, model, source,
            } => {
                assert_eq!(provider, ProviderKind::HuggingFace);
                assert_eq!(model, "fake-model");
                assert_eq!(source.to_string(), "huggingface rejected the key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_chain_is_truncated_to_two() {
        let gateway = ProviderGateway::new(vec![
            as_dyn(&FakeProvider::ok(ProviderKind::Gemini, "a")),
            as_dyn(&FakeProvider::ok(ProviderKind::HuggingFace, "b")),
            as_dyn(&FakeProvider::ok(ProviderKind::OpenAi, "c")),
        ]);
        assert_eq!(gateway.chain.len(), 2);
    }

    #[test]
    fn test_status_reports_primary_or_none() {
        let none = ProviderGateway::default().status();
        assert!(!none.ok);
        assert_eq!(none.provider, "none");
        assert_eq!(none.model, None);

        let gateway = ProviderGateway::new(vec![as_dyn(&FakeProvider::ok(ProviderKind::OpenAi, "x"))]);
        let status = gateway.status();
        assert!(status.ok);
        assert_eq!(status.provider, "openai");
        assert_eq!(status.model.as_deref(), Some("fake-model"));
    }

    #[test]
    fn test_precedence_default_and_override() {
        assert_eq!(
            precedence(None),
            vec![ProviderKind::Gemini, ProviderKind::HuggingFace, ProviderKind::OpenAi]
        );
        assert_eq!(
            precedence(Some("openai")),
            vec![ProviderKind::OpenAi, ProviderKind::Gemini, ProviderKind::HuggingFace]
        );
        assert_eq!(precedence(Some("unknown")), precedence(None));
    }

    #[test]
    fn test_from_config_respects_keys_and_override() {
        let config = Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "HUGGING_FACE_TOKEN" => Some("hf-test".to_string()),
            "AI_PROVIDER" => Some("openai".to_string()),
            _ => None,
        })
        .unwrap();
        let gateway = ProviderGateway::from_config(&config, Client::new());
        let status = gateway.status();
        assert_eq!(status.provider, "openai");
        assert_eq!(status.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(gateway.chain[1].kind(), ProviderKind::HuggingFace);
    }
}
