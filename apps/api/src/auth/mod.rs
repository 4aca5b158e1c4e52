// GitHub sign-in: in-memory sessions keyed by an opaque cookie, plus the
// short-lived OAuth `state` values issued at sign-in.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::github::GithubUser;

pub const SESSION_COOKIE: &str = "makalah_session";
pub const SESSION_TTL_DAYS: i64 = 7;
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user: GithubUser,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::days(SESSION_TTL_DAYS)
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    pending_states: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh OAuth `state` and drops any that have expired.
    pub async fn issue_state(&self) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let mut pending = self.pending_states.write().await;
        pending.retain(|_, issued| now - *issued <= Duration::minutes(OAUTH_STATE_TTL_MINUTES));
        pending.insert(state.clone(), now);
        state
    }

    /// Consumes `state`; true only for a known, unexpired value.
    pub async fn take_state(&self, state: &str) -> bool {
        let issued = self.pending_states.write().await.remove(state);
        matches!(issued, Some(at) if Utc::now() - at <= Duration::minutes(OAUTH_STATE_TTL_MINUTES))
    }

    /// Stores a new session. Expired sessions are swept on the way in.
    pub async fn create(&self, user: GithubUser, access_token: String) -> Session {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user,
            access_token,
            created_at: now,
        };
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        if session.is_expired(Utc::now()) {
            self.sessions.write().await.remove(&id);
            return None;
        }
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Session referenced by the request's cookie, if any.
    pub async fn from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        self.get(session_id(headers)?).await
    }
}

/// Reads the session id out of the `Cookie` header(s).
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(id: Uuid, secure: bool) -> String {
    let max_age = SESSION_TTL_DAYS * 24 * 60 * 60;
    let mut cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
