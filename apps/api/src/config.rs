use anyhow::{Context, Result};

use crate::providers::{gemini, huggingface, openai};

/// Application configuration loaded from environment variables.
///
/// Every provider and integration key is optional: missing keys disable the
/// matching feature at request time instead of failing startup. Values are
/// trimmed and empty strings count as unset.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Absolute origin used to build OAuth redirect URLs.
    pub public_base_url: String,

    pub google_api_key: Option<String>,
    pub google_model: String,
    pub hugging_face_token: Option<String>,
    pub hugging_face_model: String,
    /// `router` (default) or `inference`.
    pub hugging_face_api: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Optional provider override: `gemini`, `huggingface` or `openai`.
    pub ai_provider: Option<String>,

    pub github_id: Option<String>,
    pub github_secret: Option<String>,

    pub newsletter_webhook_url: Option<String>,
    pub newsletter_github_token: Option<String>,
    pub newsletter_repo: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process environment in
    /// production, a closure over fixed values in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = get_or("PORT", "8080")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        Ok(Config {
            port,
            rust_log: get_or("RUST_LOG", "info"),
            public_base_url: get("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),

            google_api_key: get("GOOGLE_API_KEY"),
            google_model: get_or("GOOGLE_MODEL", gemini::DEFAULT_MODEL),
            hugging_face_token: get("HUGGING_FACE_TOKEN"),
            hugging_face_model: get_or("HUGGING_FACE_MODEL", huggingface::DEFAULT_MODEL),
            hugging_face_api: get_or("HUGGING_FACE_API", "router"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get_or("OPENAI_MODEL", openai::DEFAULT_MODEL),
            ai_provider: get("AI_PROVIDER"),

            github_id: get("GITHUB_ID"),
            github_secret: get("GITHUB_SECRET"),

            newsletter_webhook_url: get("NEWSLETTER_WEBHOOK_URL"),
            newsletter_github_token: get("NEWSLETTER_GITHUB_TOKEN"),
            newsletter_repo: get("NEWSLETTER_REPO"),
        })
    }

    /// GitHub OAuth credentials, when both halves are configured.
    pub fn github_oauth(&self) -> Option<(&str, &str)> {
        match (&self.github_id, &self.github_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.public_base_url, "http://localhost:8080");
        assert_eq!(config.google_model, "gemini-1.5-flash");
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.hugging_face_model, "openai/gpt-oss-120b:fireworks-ai");
        assert!(config.google_api_key.is_none());
        assert!(config.github_oauth().is_none());
    }

    #[test]
    fn test_values_are_trimmed_and_blank_is_unset() {
        let config = config_from(&[
            ("OPENAI_MODEL", "  gpt-4o  "),
            ("GOOGLE_API_KEY", "   "),
            ("PUBLIC_BASE_URL", "https://makalah.example/"),
        ])
        .unwrap();
        assert_eq!(config.openai_model, "gpt-4o");
        assert!(config.google_api_key.is_none());
        assert_eq!(config.public_base_url, "https://makalah.example");
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn test_github_oauth_requires_both_halves() {
        let config = config_from(&[("GITHUB_ID", "id")]).unwrap();
        assert!(config.github_oauth().is_none());
        let config = config_from(&[("GITHUB_ID", "id"), ("GITHUB_SECRET", "s")]).unwrap();
        assert_eq!(config.github_oauth(), Some(("id", "s")));
    }
}
