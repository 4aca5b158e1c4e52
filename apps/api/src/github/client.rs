//! Thin REST client over the GitHub OAuth and v3 APIs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{GithubError, RepoRef};
use crate::providers::http::api_error_message;

pub const API_BASE: &str = "https://api.github.com";
pub const OAUTH_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const OAUTH_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const OAUTH_SCOPE: &str = "read:user repo user:email";

const USER_AGENT: &str = "makalah-api";
const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Public profile fields kept in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubUser {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Result of writing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitResult {
    pub commit_sha: String,
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentInfo {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    commit: PutCommit,
    content: Option<PutContent>,
}

#[derive(Debug, Deserialize)]
struct PutCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HtmlUrl {
    html_url: String,
}

#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(http: Client) -> Self {
        Self::with_api_base(http, API_BASE)
    }

    pub fn with_api_base(http: Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Authorization URL the browser is sent to on sign-in.
    pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> Result<Url, GithubError> {
        Url::parse_with_params(
            OAUTH_AUTHORIZE_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri),
                ("scope", OAUTH_SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| GithubError::OAuth(e.to_string()))
    }

    /// Exchanges an OAuth `code` for an access token.
    pub async fn exchange_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, GithubError> {
        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT)
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "code": code,
                "redirect_uri": redirect_uri,
            }))
            .send()
            .await?;
        let token: TokenResponse = checked(response).await?.json().await?;

        match token.access_token {
            Some(t) if !t.is_empty() => Ok(t),
            _ => Err(GithubError::OAuth(
                token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "empty token response".to_string()),
            )),
        }
    }

    pub async fn fetch_user(&self, token: &str) -> Result<GithubUser, GithubError> {
        let url = self.url(&["user"])?;
        let response = self.authed(self.http.get(url), token).send().await?;
        Ok(checked(response).await?.json().await?)
    }

    pub async fn default_branch(&self, token: &str, repo: &RepoRef) -> Result<String, GithubError> {
        let url = self.repo_url(repo, &[])?;
        let response = self.authed(self.http.get(url), token).send().await?;
        let info: RepoInfo = checked(response).await?.json().await?;
        Ok(info.default_branch)
    }

    /// Head commit of `branch`, or `None` when the branch does not exist.
    pub async fn branch_sha(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
    ) -> Result<Option<String>, GithubError> {
        let mut tail = vec!["git", "ref", "heads"];
        tail.extend(branch.split('/'));
        let url = self.repo_url(repo, &tail)?;
        let response = self.authed(self.http.get(url), token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let git_ref: GitRef = checked(response).await?.json().await?;
        Ok(Some(git_ref.object.sha))
    }

    /// Creates `branch` from the head of `base` unless it already exists.
    pub async fn ensure_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        base: &str,
    ) -> Result<(), GithubError> {
        if self.branch_sha(token, repo, branch).await?.is_some() {
            return Ok(());
        }
        let base_sha = self
            .branch_sha(token, repo, base)
            .await?
            .ok_or_else(|| GithubError::Api {
                status: 404,
                message: format!("Base branch {base:?} not found"),
            })?;

        let url = self.repo_url(repo, &["git", "refs"])?;
        let response = self
            .authed(self.http.post(url), token)
            .json(&json!({ "ref": format!("refs/heads/{branch}"), "sha": base_sha }))
            .send()
            .await?;
        checked(response).await?;
        info!(repo = %format!("{}/{}", repo.owner, repo.name), branch, base, "Branch created");
        Ok(())
    }

    /// Blob sha of an existing file on `branch`, needed to update it.
    pub async fn file_sha(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GithubError> {
        let mut url = self.contents_url(repo, path)?;
        url.query_pairs_mut().append_pair("ref", branch);
        let response = self.authed(self.http.get(url), token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let info: ContentInfo = checked(response).await?.json().await?;
        Ok(Some(info.sha))
    }

    /// Creates or updates `path` on `branch` with `content`.
    pub async fn put_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
        content: &[u8],
        message: &str,
    ) -> Result<CommitResult, GithubError> {
        let existing = self.file_sha(token, repo, path, branch).await?;
        debug!(path, branch, update = existing.is_some(), "Writing file to GitHub");

        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": branch,
        });
        if let (Some(sha), Some(obj)) = (existing, body.as_object_mut()) {
            obj.insert("sha".to_string(), Value::String(sha));
        }

        let url = self.contents_url(repo, path)?;
        let response = self.authed(self.http.put(url), token).json(&body).send().await?;
        let put: PutContentResponse = checked(response).await?.json().await?;
        Ok(CommitResult {
            commit_sha: put.commit.sha,
            html_url: put.content.and_then(|c| c.html_url),
        })
    }

    pub async fn create_pull_request(
        &self,
        token: &str,
        repo: &RepoRef,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, GithubError> {
        let url = self.repo_url(repo, &["pulls"])?;
        let response = self
            .authed(self.http.post(url), token)
            .json(&json!({ "title": title, "head": head, "base": base, "body": body }))
            .send()
            .await?;
        let pr: HtmlUrl = checked(response).await?.json().await?;
        Ok(pr.html_url)
    }

    pub async fn create_issue(
        &self,
        token: &str,
        repo: &RepoRef,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<String, GithubError> {
        let url = self.repo_url(repo, &["issues"])?;
        let response = self
            .authed(self.http.post(url), token)
            .json(&json!({ "title": title, "body": body, "labels": labels }))
            .send()
            .await?;
        let issue: HtmlUrl = checked(response).await?.json().await?;
        Ok(issue.html_url)
    }

    // ── URL helpers ──────────────────────────────────────────────────────────

    fn url(&self, segments: &[&str]) -> Result<Url, GithubError> {
        let mut url = Url::parse(&self.api_base).map_err(|e| GithubError::Api {
            status: 0,
            message: format!("invalid API base: {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| GithubError::Api {
                status: 0,
                message: "API base cannot take a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_url(&self, repo: &RepoRef, tail: &[&str]) -> Result<Url, GithubError> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str()];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> Result<Url, GithubError> {
        let mut tail = vec!["contents"];
        tail.extend(path.split('/').filter(|s| !s.is_empty()));
        self.repo_url(repo, &tail)
    }

    fn authed(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .bearer_auth(token)
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GithubError::Api {
        status: status.as_u16(),
        message: api_error_message(&body, "GitHub", status.as_u16()),
    })
}
