// Editor shell state: document blocks, toolbar commands, theme, chat log and
// busy flags. Each open editor lives in memory under a UUID; handlers lock it
// only for state transitions, never across a provider call.

pub mod commands;
pub mod handlers;
pub mod state;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use state::EditorState;

/// Editors untouched for this long are dropped on the next `create`.
pub const EDITOR_IDLE_HOURS: i64 = 24;

pub type SharedEditor = Arc<Mutex<EditorState>>;

struct Entry {
    editor: SharedEditor,
    touched_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct EditorStore {
    entries: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl EditorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, state: EditorState) -> (Uuid, SharedEditor) {
        let id = Uuid::new_v4();
        let editor = Arc::new(Mutex::new(state));
        let now = Utc::now();

        let mut entries = self.entries.write().await;
        entries.retain(|_, e| now - e.touched_at <= Duration::hours(EDITOR_IDLE_HOURS));
        entries.insert(
            id,
            Entry {
                editor: Arc::clone(&editor),
                touched_at: now,
            },
        );
        debug!(%id, open = entries.len(), "Editor opened");
        (id, editor)
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedEditor> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(&id)?;
        entry.touched_at = Utc::now();
        Some(Arc::clone(&entry.editor))
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.entries.write().await.remove(&id).is_some()
    }
}
