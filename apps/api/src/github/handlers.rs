//! Axum route handler for committing the makalah to a GitHub repository.

use axum::{extract::State, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::RepoRef;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// `owner/name`.
    pub repo: String,
    pub path: String,
    #[serde(default)]
    pub content: String,
    pub message: Option<String>,
    /// Target branch; defaults to the base branch.
    pub branch: Option<String>,
    pub pull_request: Option<PullRequestOptions>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestOptions {
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    /// Defaults to the repository's default branch.
    pub base: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub commit_sha: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
}

/// POST /api/github/commit
///
/// Writes `content` to `path` using the signed-in user's token. When
/// `pullRequest` is given and the target branch differs from the base, the
/// branch is created if needed and a pull request is opened.
pub async fn handle_commit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, AppError> {
    let session = state
        .sessions
        .from_headers(&headers)
        .await
        .ok_or(AppError::Unauthorized)?;

    let repo = RepoRef::parse(&request.repo).map_err(|e| AppError::Validation(e.to_string()))?;
    let path = request.path.trim().trim_start_matches('/').to_string();
    if path.is_empty() {
        return Err(AppError::Validation("Path file wajib diisi".to_string()));
    }
    let message = request
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Update {path}"));

    let token = session.access_token.as_str();
    let github = &state.github;

    let base = match request.pull_request.as_ref().and_then(|pr| pr.base.clone()) {
        Some(base) => base,
        None => github.default_branch(token, &repo).await?,
    };
    let branch = request
        .branch
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| base.clone());
    if branch != base {
        github.ensure_branch(token, &repo, &branch, &base).await?;
    }

    let commit = github
        .put_file(token, &repo, &path, &branch, request.content.as_bytes(), &message)
        .await?;
    info!(
        login = %session.user.login,
        repo = %request.repo,
        path = %path,
        branch = %branch,
        sha = %commit.commit_sha,
        "Makalah committed"
    );

    let pull_request_url = match request.pull_request {
        Some(pr) if branch != base => {
            let title = pr.title.unwrap_or_else(|| message.clone());
            Some(
                github
                    .create_pull_request(token, &repo, &branch, &base, &title, &pr.body)
                    .await?,
            )
        }
        _ => None,
    };

    Ok(Json(CommitResponse {
        commit_sha: commit.commit_sha,
        branch,
        html_url: commit.html_url,
        pull_request_url,
    }))
}
