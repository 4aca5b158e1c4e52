//! Newsletter sign-up form.
//!
//! A valid subscription is forwarded to a webhook when one is configured,
//! otherwise filed as a GitHub issue. Forwarding failures are logged and the
//! visitor still sees the success redirect.

use axum::{
    extract::{rejection::FormRejection, State},
    response::Redirect,
    Form,
};
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::github::RepoRef;
use crate::state::AppState;

pub const SUCCESS_REDIRECT: &str = "/?subscribed=1";
pub const FAILURE_REDIRECT: &str = "/?subscribed=0";
pub const ISSUE_LABEL: &str = "newsletter";

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub name: String,
    pub email: String,
}

impl Subscriber {
    /// Trims both fields and lowercases the email. `None` when the email is
    /// not a plausible address.
    pub fn parse(form: &SubscribeForm) -> Option<Self> {
        let email = form.email.trim().to_lowercase();
        if !EMAIL.is_match(&email) {
            return None;
        }
        Some(Self {
            name: form.name.trim().to_string(),
            email,
        })
    }

    pub fn issue_title(&self) -> String {
        format!("Newsletter: {} <{}>", self.name, self.email)
    }

    pub fn issue_body(&self, at: DateTime<Utc>) -> String {
        format!(
            "New subscriber\n\n- Name: {}\n- Email: {}\n- Time: {}",
            self.name,
            self.email,
            at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// POST /api/newsletter
pub async fn handle_subscribe(
    State(state): State<AppState>,
    form: Result<Form<SubscribeForm>, FormRejection>,
) -> Redirect {
    let form = match form {
        Ok(Form(form)) => form,
        Err(e) => {
            warn!("Newsletter form rejected: {e}");
            return Redirect::to(FAILURE_REDIRECT);
        }
    };
    let Some(subscriber) = Subscriber::parse(&form) else {
        return Redirect::to(FAILURE_REDIRECT);
    };

    if let Err(e) = forward(&state, &subscriber).await {
        warn!(email = %subscriber.email, "Newsletter forwarding failed: {e:#}");
    }
    Redirect::to(SUCCESS_REDIRECT)
}

async fn forward(state: &AppState, subscriber: &Subscriber) -> anyhow::Result<()> {
    let now = Utc::now();
    let config = &state.config;

    if let Some(webhook) = &config.newsletter_webhook_url {
        state
            .http
            .post(webhook)
            .json(&json!({
                "name": subscriber.name,
                "email": subscriber.email,
                "ts": now.to_rfc3339_opts(SecondsFormat::Millis, true),
            }))
            .send()
            .await?
            .error_for_status()?;
        info!(email = %subscriber.email, "Newsletter subscriber sent to webhook");
        return Ok(());
    }

    if let (Some(token), Some(repo)) = (&config.newsletter_github_token, &config.newsletter_repo) {
        let Ok(repo) = RepoRef::parse(repo) else {
            warn!(repo = %repo, "NEWSLETTER_REPO is not owner/name; subscriber dropped");
            return Ok(());
        };
        let url = state
            .github
            .create_issue(
                token,
                &repo,
                &subscriber.issue_title(),
                &subscriber.issue_body(now),
                &[ISSUE_LABEL],
            )
            .await?;
        info!(email = %subscriber.email, issue = %url, "Newsletter subscriber filed as issue");
        return Ok(());
    }

    info!(email = %subscriber.email, "Newsletter subscriber accepted; no forwarding target configured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn form(name: &str, email: &str) -> SubscribeForm {
        SubscribeForm {
            name: name.into(),
            email: email.into(),
        }
    }

    #[test]
    fn test_parse_normalizes_email() {
        let s = Subscriber::parse(&form("  Siti ", " Siti@Kampus.AC.id ")).unwrap();
        assert_eq!(s.name, "Siti");
        assert_eq!(s.email, "siti@kampus.ac.id");
    }

    #[test]
    fn test_parse_rejects_invalid_emails() {
        for bad in ["", "siti", "siti@kampus", "si ti@kampus.id", "@kampus.id", "siti@@kampus.id"] {
            assert!(Subscriber::parse(&form("Siti", bad)).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_issue_text() {
        let s = Subscriber::parse(&form("Siti", "siti@kampus.id")).unwrap();
        assert_eq!(s.issue_title(), "Newsletter: Siti <siti@kampus.id>");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(
            s.issue_body(at),
            "New subscriber\n\n- Name: Siti\n- Email: siti@kampus.id\n- Time: 2024-05-01T08:30:00.000Z"
        );
    }
}
