//! Editor application state.
//!
//! One owned value holds everything the editor shell tracks between actions:
//! the document, page layout, theme, chat log and per-action busy flags. The
//! shell drives it; nothing here performs I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::WorkflowOutput;
use crate::editor::commands::{apply_command, Command, CommandError};
use crate::layout::blocks::{blocks_to_html, blocks_to_plain_text, parse_plain_text};
use crate::layout::{Block, LayoutOptions, PageGeometry};
use crate::providers::{ChatMessage, ProviderStatus, Role};

pub const DEFAULT_EDITOR_TITLE: &str = "Makalah Baru";

// ────────────────────────────────────────────────────────────────────────────
// Small enums
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Dark,
    Light,
}

impl Theme {
    /// System → Dark → Light → System.
    pub fn next(self) -> Self {
        match self {
            Theme::System => Theme::Dark,
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::System,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::System => "System",
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        }
    }
}

/// How an assistant chat reply lands in the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiEditMode {
    #[default]
    Append,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BusyAction {
    Generate,
    Workflow,
    Chat,
    ExportDocx,
    ExportPdf,
}

impl BusyAction {
    pub const ALL: [BusyAction; 5] = [
        BusyAction::Generate,
        BusyAction::Workflow,
        BusyAction::Chat,
        BusyAction::ExportDocx,
        BusyAction::ExportPdf,
    ];

    fn slot(self) -> usize {
        match self {
            BusyAction::Generate => 0,
            BusyAction::Workflow => 1,
            BusyAction::Chat => 2,
            BusyAction::ExportDocx => 3,
            BusyAction::ExportPdf => 4,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Busy flags
// ────────────────────────────────────────────────────────────────────────────

/// One flag per action. A flag is held by at most one `BusyGuard`.
#[derive(Debug, Default)]
pub struct BusyFlags {
    flags: [Arc<AtomicBool>; 5],
}

impl BusyFlags {
    pub fn try_begin(&self, action: BusyAction) -> Option<BusyGuard> {
        let flag = &self.flags[action.slot()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                action,
                flag: Arc::clone(flag),
            })
    }

    pub fn is_busy(&self, action: BusyAction) -> bool {
        self.flags[action.slot()].load(Ordering::Acquire)
    }

    pub fn any_busy(&self) -> bool {
        BusyAction::ALL.iter().any(|a| self.is_busy(*a))
    }
}

/// Clears its flag when dropped, whether the action succeeded or failed.
#[derive(Debug)]
pub struct BusyGuard {
    action: BusyAction,
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    pub fn action(&self) -> BusyAction {
        self.action
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chat log
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl ChatEntry {
    /// Time the assistant spent on this reply, when both ends were recorded.
    pub fn worked_for(&self) -> Option<Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

/// `"1m 5s"` or `"42s"`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let (m, s) = (secs / 60, secs % 60);
    if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Editor state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EditorState {
    pub title: String,
    pub blocks: Vec<Block>,
    pub geometry: PageGeometry,
    pub theme: Theme,
    pub sidebar_open: bool,
    pub ai_edit_mode: AiEditMode,
    pub chat: Vec<ChatEntry>,
    pub provider: Option<String>,
    pub model: Option<String>,
    busy: BusyFlags,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(DEFAULT_EDITOR_TITLE)
    }
}

impl EditorState {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            blocks: Vec::new(),
            geometry: PageGeometry::from_layout(None),
            theme: Theme::default(),
            sidebar_open: true,
            ai_edit_mode: AiEditMode::default(),
            chat: Vec::new(),
            provider: None,
            model: None,
            busy: BusyFlags::default(),
        }
    }

    pub fn cycle_theme(&mut self) -> Theme {
        self.theme = self.theme.next();
        self.theme
    }

    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_open = !self.sidebar_open;
        self.sidebar_open
    }

    pub fn set_layout(&mut self, layout: &LayoutOptions) {
        self.geometry = PageGeometry::from_layout(Some(layout));
    }

    pub fn set_provider_status(&mut self, status: &ProviderStatus) {
        self.provider = Some(status.provider.clone());
        self.model = status.model.clone();
    }

    pub fn try_begin(&self, action: BusyAction) -> Option<BusyGuard> {
        self.busy.try_begin(action)
    }

    pub fn is_busy(&self, action: BusyAction) -> bool {
        self.busy.is_busy(action)
    }

    pub fn any_busy(&self) -> bool {
        self.busy.any_busy()
    }

    /// Actions currently in flight, in toolbar order.
    pub fn busy_actions(&self) -> Vec<BusyAction> {
        BusyAction::ALL
            .into_iter()
            .filter(|a| self.is_busy(*a))
            .collect()
    }

    pub fn apply_command(&mut self, command: Command) -> Result<(), CommandError> {
        apply_command(&mut self.blocks, command)
    }

    // ── Derived exporter input ────────────────────────────────────────────

    pub fn plain_text(&self) -> String {
        blocks_to_plain_text(&self.blocks)
    }

    pub fn html(&self) -> String {
        blocks_to_html(&self.blocks)
    }

    // ── AI results (last write wins) ──────────────────────────────────────

    /// Appends a generated draft after the existing content.
    pub fn apply_generated(&mut self, text: &str) {
        let parsed = parse_plain_text(text);
        debug!(blocks = parsed.len(), "Appending generated draft");
        self.blocks.extend(parsed);
    }

    /// Records the user's chat turn and returns the conversation to send.
    pub fn push_user_message(&mut self, content: &str, now: DateTime<Utc>) -> Vec<ChatMessage> {
        self.chat.push(ChatEntry {
            role: Role::User,
            content: content.to_string(),
            created_at: now,
            started_at: None,
            ended_at: None,
        });
        self.conversation()
    }

    pub fn conversation(&self) -> Vec<ChatMessage> {
        self.chat
            .iter()
            .map(|e| ChatMessage {
                role: e.role,
                content: e.content.clone(),
            })
            .collect()
    }

    /// Logs the assistant reply and writes it into the document according to
    /// `ai_edit_mode`.
    pub fn apply_chat_reply(&mut self, text: &str, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) {
        self.chat.push(ChatEntry {
            role: Role::Assistant,
            content: text.to_string(),
            created_at: ended_at,
            started_at: Some(started_at),
            ended_at: Some(ended_at),
        });

        let parsed = parse_plain_text(text);
        match self.ai_edit_mode {
            AiEditMode::Append => self.blocks.extend(parsed),
            AiEditMode::Replace => self.blocks = parsed,
        }
    }

    /// Takes the workflow title (when present) and appends the rendered
    /// chapter one.
    pub fn apply_workflow(&mut self, output: &WorkflowOutput) {
        if !output.title.trim().is_empty() {
            self.title = output.title.trim().to_string();
        }
        let text = output.to_bab1_text();
        if !text.is_empty() {
            self.blocks.extend(parse_plain_text(&text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::service::{Bab1, RuangLingkup};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_theme_cycle() {
        let mut state = EditorState::default();
        assert_eq!(state.theme, Theme::System);
        assert_eq!(state.cycle_theme(), Theme::Dark);
        assert_eq!(state.cycle_theme(), Theme::Light);
        assert_eq!(state.cycle_theme(), Theme::System);
        assert_eq!(Theme::Dark.label(), "Dark");
    }

    #[test]
    fn test_busy_guard_blocks_then_releases() {
        let state = EditorState::default();
        let guard = state.try_begin(BusyAction::Generate).unwrap();
        assert!(state.is_busy(BusyAction::Generate));
        assert!(state.try_begin(BusyAction::Generate).is_none());
        assert!(state.try_begin(BusyAction::ExportPdf).is_some());
        drop(guard);
        assert!(!state.is_busy(BusyAction::Generate));
        assert!(state.try_begin(BusyAction::Generate).is_some());
    }

    #[test]
    fn test_busy_guard_released_on_error_path() {
        let state = EditorState::default();
        let failing = || -> Result<(), &'static str> {
            let _guard = state.try_begin(BusyAction::Workflow).ok_or("busy")?;
            Err("provider down")
        };
        assert_eq!(failing(), Err("provider down"));
        assert!(!state.is_busy(BusyAction::Workflow));
    }

    #[test]
    fn test_apply_generated_appends() {
        let mut state = EditorState::default();
        state.apply_generated("Paragraf satu.");
        state.apply_generated("# Judul\n\nParagraf dua.");
        assert_eq!(
            state.blocks,
            vec![
                Block::paragraph("Paragraf satu."),
                Block::heading(1, "Judul"),
                Block::paragraph("Paragraf dua."),
            ]
        );
        assert_eq!(state.plain_text(), "Paragraf satu.\n\nJudul\n\nParagraf dua.");
    }

    #[test]
    fn test_chat_reply_respects_edit_mode() {
        let mut state = EditorState::default();
        state.apply_generated("Lama.");
        let convo = state.push_user_message("Perbaiki", at(0));
        assert_eq!(convo, vec![ChatMessage::user("Perbaiki")]);

        state.apply_chat_reply("Tambahan.", at(1), at(66));
        assert_eq!(state.blocks.len(), 2);
        let reply = state.chat.last().unwrap();
        assert_eq!(format_duration(reply.worked_for().unwrap()), "1m 5s");

        state.ai_edit_mode = AiEditMode::Replace;
        state.apply_chat_reply("Baru.", at(70), at(72));
        assert_eq!(state.blocks, vec![Block::paragraph("Baru.")]);
        assert_eq!(state.conversation().len(), 3);
    }

    #[test]
    fn test_apply_workflow_sets_title_and_appends_bab1() {
        let mut state = EditorState::default();
        let output = WorkflowOutput {
            title: "Literasi guna Kinerja dalam rangka Mutu".into(),
            bab1: Bab1 {
                latar_belakang: "Latar.".into(),
                persoalan: vec!["Satu".into()],
                ruang_lingkup: RuangLingkup::default(),
                ..Default::default()
            },
            ..Default::default()
        };
        state.apply_workflow(&output);
        assert_eq!(state.title, "Literasi guna Kinerja dalam rangka Mutu");
        assert_eq!(state.blocks[0], Block::heading(1, "BAB I — Pendahuluan"));
        assert!(state
            .blocks
            .iter()
            .any(|b| *b == Block::heading(2, "C. Persoalan-persoalan")));
    }

    #[test]
    fn test_provider_status_display() {
        let mut state = EditorState::default();
        state.set_provider_status(&ProviderStatus {
            ok: true,
            provider: "gemini".into(),
            model: Some("gemini-1.5-flash".into()),
        });
        assert_eq!(state.provider.as_deref(), Some("gemini"));
        assert_eq!(state.model.as_deref(), Some("gemini-1.5-flash"));
    }
}
