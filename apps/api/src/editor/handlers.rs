//! Axum route handlers for server-side editor sessions.
//!
//! Each AI or export action takes the matching busy flag first; a second
//! request for the same action on the same editor gets 409 until the first
//! finishes, whether it succeeds or fails.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::commands::Command;
use super::state::{
    format_duration, AiEditMode, BusyAction, BusyGuard, ChatEntry, EditorState, Theme,
    DEFAULT_EDITOR_TITLE,
};
use super::SharedEditor;
use crate::ai::handlers::{GenerateRequest, TopicRequest};
use crate::ai::service::{chat_revise, generate_draft, run_workflow};
use crate::errors::AppError;
use crate::export::handlers::{docx_attachment, pdf_attachment};
use crate::layout::handlers::{layout_blocks, PaginateResponse};
use crate::layout::{document_blocks, Block, LayoutOptions, PageGeometry};
use crate::providers::Generated;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEditorRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub content_html: Option<String>,
    pub layout: Option<LayoutOptions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEditorRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub cycle_theme: bool,
    #[serde(default)]
    pub toggle_sidebar: bool,
    pub ai_edit_mode: Option<AiEditMode>,
    pub layout: Option<LayoutOptions>,
}

#[derive(Debug, Deserialize)]
pub struct EditorChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    #[serde(flatten)]
    pub entry: ChatEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worked_for: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub id: Uuid,
    pub title: String,
    pub theme: Theme,
    pub theme_label: &'static str,
    pub sidebar_open: bool,
    pub ai_edit_mode: AiEditMode,
    pub blocks: Vec<Block>,
    pub html: String,
    pub plain_text: String,
    pub chat: Vec<ChatView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub busy: Vec<BusyAction>,
}

impl EditorView {
    fn new(id: Uuid, state: &EditorState) -> Self {
        Self {
            id,
            title: state.title.clone(),
            theme: state.theme,
            theme_label: state.theme.label(),
            sidebar_open: state.sidebar_open,
            ai_edit_mode: state.ai_edit_mode,
            blocks: state.blocks.clone(),
            html: state.html(),
            plain_text: state.plain_text(),
            chat: state
                .chat
                .iter()
                .map(|entry| ChatView {
                    worked_for: entry.worked_for().map(format_duration),
                    entry: entry.clone(),
                })
                .collect(),
            provider: state.provider.clone(),
            model: state.model.clone(),
            busy: state.busy_actions(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EditorResponse {
    #[serde(flatten)]
    pub editor: EditorView,
    pub layout: PaginateResponse,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn find(state: &AppState, id: Uuid) -> Result<SharedEditor, AppError> {
    state
        .editors
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Editor {id} not found")))
}

async fn begin(editor: &SharedEditor, action: BusyAction) -> Result<BusyGuard, AppError> {
    let guard = editor
        .lock()
        .await
        .try_begin(action)
        .ok_or_else(|| AppError::Conflict(format!("{action:?} is already running for this editor")))?;
    debug!(action = ?guard.action(), "Editor action started");
    Ok(guard)
}

fn record_provider(editor: &mut EditorState, generated: &Generated) {
    editor.provider = Some(generated.provider.as_str().to_string());
    editor.model = Some(generated.model.clone());
}

/// Copies what the response needs out of a locked editor.
fn snapshot(id: Uuid, editor: &EditorState) -> (EditorView, PageGeometry) {
    (EditorView::new(id, editor), editor.geometry.clone())
}

/// Runs the layout pass for a snapshot on the blocking pool. Callers release
/// the editor lock before awaiting this.
async fn respond(
    state: &AppState,
    (view, geometry): (EditorView, PageGeometry),
) -> Result<Json<EditorResponse>, AppError> {
    let blocks = view.blocks.clone();
    let style = state.text_style.clone();
    let layout = tokio::task::spawn_blocking(move || layout_blocks(&blocks, geometry, style))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("layout task panicked: {e}")))?;

    Ok(Json(EditorResponse {
        editor: view,
        layout,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/editor
///
/// Opens an editor seeded from `contentHtml` (preferred) or plain `content`.
pub async fn handle_create(
    State(state): State<AppState>,
    Json(request): Json<CreateEditorRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_EDITOR_TITLE.to_string());

    let mut editor = EditorState::new(title);
    editor.blocks = document_blocks(request.content_html.as_deref(), &request.content);
    if let Some(layout) = &request.layout {
        editor.set_layout(layout);
    }
    editor.set_provider_status(&state.gateway.status());

    let (id, shared) = state.editors.create(editor).await;
    info!(%id, "Editor created");
    let view = snapshot(id, &*shared.lock().await);
    respond(&state, view).await
}

/// GET /api/editor/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditorResponse>, AppError> {
    let editor = find(&state, id).await?;
    let view = snapshot(id, &*editor.lock().await);
    respond(&state, view).await
}

/// PATCH /api/editor/:id
///
/// Shell settings: title, theme cycle, sidebar toggle, AI edit mode, page layout.
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEditorRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let editor = find(&state, id).await?;
    let mut guard = editor.lock().await;

    if let Some(title) = request.title.filter(|t| !t.trim().is_empty()) {
        guard.title = title.trim().to_string();
    }
    if request.cycle_theme {
        guard.cycle_theme();
    }
    if request.toggle_sidebar {
        guard.toggle_sidebar();
    }
    if let Some(mode) = request.ai_edit_mode {
        guard.ai_edit_mode = mode;
    }
    if let Some(layout) = &request.layout {
        guard.set_layout(layout);
    }
    let view = snapshot(id, &guard);
    drop(guard);
    respond(&state, view).await
}

/// DELETE /api/editor/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let editor = find(&state, id).await?;
    if editor.lock().await.any_busy() {
        return Err(AppError::Conflict(
            "Editor has an action in progress".to_string(),
        ));
    }
    state.editors.remove(id).await;
    info!(%id, "Editor closed");
    Ok(Json(json!({ "ok": true })))
}

/// POST /api/editor/:id/command
pub async fn handle_command(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(command): Json<Command>,
) -> Result<Json<EditorResponse>, AppError> {
    let editor = find(&state, id).await?;
    let mut guard = editor.lock().await;
    guard
        .apply_command(command)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let view = snapshot(id, &guard);
    drop(guard);
    respond(&state, view).await
}

/// POST /api/editor/:id/generate
///
/// Appends a generated draft after the current content.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let editor = find(&state, id).await?;
    let busy = begin(&editor, BusyAction::Generate).await?;

    let generated = generate_draft(
        &state.gateway,
        request.topic.as_deref(),
        request.style.as_deref(),
    )
    .await?;

    let mut guard = editor.lock().await;
    guard.apply_generated(&generated.text);
    record_provider(&mut guard, &generated);
    drop(busy);
    let view = snapshot(id, &guard);
    drop(guard);
    respond(&state, view).await
}

/// POST /api/editor/:id/chat
///
/// Sends the chat log plus the current document as context; the reply is
/// appended or replaces the document per the editor's AI edit mode.
pub async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EditorChatRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::Validation("Pesan kosong".to_string()));
    }
    let editor = find(&state, id).await?;
    let busy = begin(&editor, BusyAction::Chat).await?;

    let (conversation, context, topic) = {
        let mut guard = editor.lock().await;
        let conversation = guard.push_user_message(&message, Utc::now());
        (conversation, guard.plain_text(), guard.title.clone())
    };

    let started_at = Utc::now();
    let generated = chat_revise(&state.gateway, conversation, &context, &topic).await?;

    let mut guard = editor.lock().await;
    guard.apply_chat_reply(&generated.text, started_at, Utc::now());
    record_provider(&mut guard, &generated);
    drop(busy);
    let view = snapshot(id, &guard);
    drop(guard);
    respond(&state, view).await
}

/// POST /api/editor/:id/workflow
///
/// Runs the chapter-one workflow, takes its title and appends BAB I.
pub async fn handle_workflow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TopicRequest>,
) -> Result<Json<EditorResponse>, AppError> {
    let editor = find(&state, id).await?;
    let busy = begin(&editor, BusyAction::Workflow).await?;

    let output = run_workflow(&state.gateway, request.topic.as_deref()).await?;

    let mut guard = editor.lock().await;
    guard.apply_workflow(&output);
    drop(busy);
    let view = snapshot(id, &guard);
    drop(guard);
    respond(&state, view).await
}

/// POST /api/editor/:id/export/docx
pub async fn handle_export_docx(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let editor = find(&state, id).await?;
    let _busy = begin(&editor, BusyAction::ExportDocx).await?;

    let (title, blocks, size, margins) = {
        let guard = editor.lock().await;
        (
            guard.title.clone(),
            guard.blocks.clone(),
            guard.geometry.size,
            guard.geometry.margins,
        )
    };
    docx_attachment(title, blocks, size, margins).await
}

/// POST /api/editor/:id/export/pdf
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let editor = find(&state, id).await?;
    let _busy = begin(&editor, BusyAction::ExportPdf).await?;

    let (title, content) = {
        let guard = editor.lock().await;
        (guard.title.clone(), guard.plain_text())
    };
    pdf_attachment(&title, content).await
}
