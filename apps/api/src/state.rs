use reqwest::Client;

use crate::auth::SessionStore;
use crate::config::Config;
use crate::editor::EditorStore;
use crate::github::GithubClient;
use crate::layout::TextStyle;
use crate::providers::ProviderGateway;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Primary AI provider plus at most one fallback, fixed at startup.
    pub gateway: ProviderGateway,
    /// Shared HTTP client (webhooks); provider and GitHub clients hold clones.
    pub http: Client,
    pub github: GithubClient,
    pub sessions: SessionStore,
    /// Open editor sessions keyed by id.
    pub editors: EditorStore,
    /// Typography used by the pagination measurer.
    pub text_style: TextStyle,
}

impl AppState {
    pub fn new(config: Config, http: Client) -> Self {
        Self {
            gateway: ProviderGateway::from_config(&config, http.clone()),
            github: GithubClient::new(http.clone()),
            sessions: SessionStore::new(),
            editors: EditorStore::new(),
            text_style: TextStyle::default(),
            http,
            config,
        }
    }
}
