// GitHub integration: OAuth code exchange, user lookup, committing the
// makalah into a repository and opening newsletter issues.

pub mod client;
pub mod handlers;

use thiserror::Error;

pub use client::{GithubClient, GithubUser};

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Repository must look like owner/name, got {0:?}")]
    InvalidRepo(String),

    #[error("GitHub did not return an access token: {0}")]
    OAuth(String),
}

/// `owner/name` pair parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(full_name: &str) -> Result<Self, GithubError> {
        let trimmed = full_name.trim().trim_end_matches(".git");
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(GithubError::InvalidRepo(full_name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parse() {
        let repo = RepoRef::parse(" budi/makalah-ku ").unwrap();
        assert_eq!(repo.owner, "budi");
        assert_eq!(repo.name, "makalah-ku");
        assert_eq!(RepoRef::parse("budi/arsip.git").unwrap().name, "arsip");
    }

    #[test]
    fn test_repo_ref_rejects_malformed() {
        for bad in ["", "budi", "/repo", "budi/", "a/b/c"] {
            assert!(
                matches!(RepoRef::parse(bad), Err(GithubError::InvalidRepo(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
