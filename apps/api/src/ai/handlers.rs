//! Axum route handlers for the AI writing API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::ai::service::{chat_revise, generate_draft, run_workflow, suggest_titles, WorkflowOutput};
use crate::errors::AppError;
use crate::providers::{ChatMessage, ProviderKind, ProviderStatus};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub topic: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub content: String,
    pub provider: ProviderKind,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub provider: ProviderKind,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TitlesResponse {
    pub titles: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/ai/generate
///
/// Writes the opening draft (introduction, short background, problem
/// statements and objectives) for a topic.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let generated = generate_draft(
        &state.gateway,
        request.topic.as_deref(),
        request.style.as_deref(),
    )
    .await?;

    Ok(Json(GenerateResponse {
        content: generated.text,
        provider: generated.provider,
        model: generated.model,
    }))
}

/// POST /api/ai/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let generated = chat_revise(
        &state.gateway,
        request.messages,
        &request.context,
        &request.topic,
    )
    .await?;

    Ok(Json(ChatResponse {
        message: generated.text,
        provider: generated.provider,
        model: generated.model,
    }))
}

/// POST /api/ai/titles
pub async fn handle_titles(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> Result<Json<TitlesResponse>, AppError> {
    let titles = suggest_titles(&state.gateway, request.topic.as_deref().unwrap_or("")).await?;
    Ok(Json(TitlesResponse { titles }))
}

/// POST /api/ai/workflow
///
/// Returns the variables, final title, main question, derived issues and the
/// chapter-one sections as structured JSON.
pub async fn handle_workflow(
    State(state): State<AppState>,
    Json(request): Json<TopicRequest>,
) -> Result<Json<WorkflowOutput>, AppError> {
    let output = run_workflow(&state.gateway, request.topic.as_deref()).await?;
    Ok(Json(output))
}

/// GET /api/ai/health
///
/// Reports the active provider and model. Never exposes keys.
pub async fn handle_health(State(state): State<AppState>) -> Json<ProviderStatus> {
    Json(state.gateway.status())
}
