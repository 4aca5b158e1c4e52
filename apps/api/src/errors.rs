use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::export::ExportError;
use crate::github::GithubError;
use crate::providers::gateway::MISSING_PROVIDER_MESSAGE;
use crate::providers::GatewayError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Body shape: `{ "error": <message>, "code": <CODE>, "provider"?, "model"? }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    /// Another request already holds the same editor action.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Provider failure; `provider`/`model` identify the backend that was asked.
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        provider: Option<String>,
        model: Option<String>,
    },

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("GitHub error: {0}")]
    Github(#[from] GithubError),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => AppError::Provider {
                message: MISSING_PROVIDER_MESSAGE.to_string(),
                provider: Some("none".to_string()),
                model: None,
            },
            GatewayError::Failed {
                provider,
                model,
                source,
            } => AppError::Provider {
                message: source.to_string(),
                provider: Some(provider.as_str().to_string()),
                model: Some(model),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Provider { message, .. } => {
                tracing::error!("Provider error: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR", message.clone())
            }
            AppError::Export(e) => {
                tracing::error!("Export error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXPORT_ERROR",
                    format!("Gagal membuat dokumen: {e}"),
                )
            }
            AppError::Github(e) => {
                tracing::error!("GitHub error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "GITHUB_ERROR", e.to_string())
            }
            AppError::NotConfigured(msg) => (StatusCode::NOT_IMPLEMENTED, "NOT_CONFIGURED", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut body = Map::new();
        body.insert("error".to_string(), json!(message));
        body.insert("code".to_string(), json!(code));
        if let AppError::Provider { provider, model, .. } = &self {
            if let Some(p) = provider {
                body.insert("provider".to_string(), json!(p));
            }
            if let Some(m) = model {
                body.insert("model".to_string(), json!(m));
            }
        }

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, ProviderKind};

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let resp = AppError::Validation("Topik kosong".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Topik kosong");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body.get("provider").is_none());
    }

    #[tokio::test]
    async fn test_gateway_failure_carries_provider_and_model() {
        let err: AppError = GatewayError::Failed {
            provider: ProviderKind::Gemini,
            model: "gemini-1.5-flash".into(),
            source: ProviderError::Api {
                status: 403,
                message: "API key not valid".into(),
            },
        }
        .into();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "API key not valid");
        assert_eq!(body["provider"], "gemini");
        assert_eq!(body["model"], "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let resp = AppError::Internal(anyhow::anyhow!("secret path /etc/x")).into_response();
        let body = body_json(resp).await;
        assert_eq!(body["error"], "An internal server error occurred");
    }
}
