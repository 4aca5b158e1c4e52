//! Axum route handlers for GitHub sign-in.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{expired_cookie, session_cookie, session_id};
use crate::errors::AppError;
use crate::github::{GithubClient, GithubUser};
use crate::state::AppState;

pub const CALLBACK_PATH: &str = "/api/auth/callback/github";
pub const AFTER_SIGNIN_PATH: &str = "/editor";
pub const NOT_CONFIGURED_MESSAGE: &str =
    "GitHub OAuth belum dikonfigurasi: set GITHUB_ID dan GITHUB_SECRET";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<GithubUser>,
}

fn redirect_uri(state: &AppState) -> String {
    format!("{}{}", state.config.public_base_url, CALLBACK_PATH)
}

/// GET /api/auth/signin
pub async fn handle_signin(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let (client_id, _) = state
        .config
        .github_oauth()
        .ok_or_else(|| AppError::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))?;

    let oauth_state = state.sessions.issue_state().await;
    let url = GithubClient::authorize_url(client_id, &redirect_uri(&state), &oauth_state)?;
    Ok(Redirect::to(url.as_str()))
}

/// GET /api/auth/callback/github
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let (client_id, client_secret) = state
        .config
        .github_oauth()
        .ok_or_else(|| AppError::NotConfigured(NOT_CONFIGURED_MESSAGE.to_string()))?;

    if let Some(error) = query.error {
        warn!(error = %error, "GitHub sign-in denied");
        return Err(AppError::Unauthorized);
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("Missing OAuth code".to_string()))?;
    let oauth_state = query.state.unwrap_or_default();
    if !state.sessions.take_state(&oauth_state).await {
        return Err(AppError::Validation("Invalid or expired OAuth state".to_string()));
    }

    let token = state
        .github
        .exchange_code(client_id, client_secret, &code, &redirect_uri(&state))
        .await?;
    let user = state.github.fetch_user(&token).await?;
    let session = state.sessions.create(user, token).await;
    info!(login = %session.user.login, "GitHub sign-in completed");

    let secure = state.config.public_base_url.starts_with("https://");
    Ok((
        [(header::SET_COOKIE, session_cookie(session.id, secure))],
        Redirect::to(AFTER_SIGNIN_PATH),
    )
        .into_response())
}

/// GET /api/auth/session
pub async fn handle_session(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<SessionResponse> {
    let session = state.sessions.from_headers(&headers).await;
    Json(SessionResponse {
        authenticated: session.is_some(),
        user: session.map(|s| s.user),
    })
}

/// POST /api/auth/signout
pub async fn handle_signout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(id).await;
    }
    (
        [(header::SET_COOKIE, expired_cookie())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}
