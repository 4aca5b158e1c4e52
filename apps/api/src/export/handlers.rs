//! Axum route handlers for the export API.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::export::{docx, pdf, sanitize_filename, DEFAULT_TITLE};
use crate::layout::{document_blocks, Block, LayoutOptions, Margins, PageSize};

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocxExportRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub content_html: Option<String>,
    pub layout: Option<LayoutOptions>,
}

#[derive(Debug, Deserialize)]
pub struct PdfExportRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/export/docx
///
/// Prefers `contentHtml`; falls back to `content` split into paragraphs. Page
/// size and margins follow the editor layout (A4 portrait, 96px by default).
pub async fn handle_export_docx(
    Json(request): Json<DocxExportRequest>,
) -> Result<Response, AppError> {
    let title = request.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let layout = request.layout.unwrap_or_default();
    let page_size = layout.page_size.unwrap_or(PageSize::A4Portrait);
    let margins = layout.margins_px.unwrap_or_default();

    let blocks = tokio::task::spawn_blocking(move || {
        document_blocks(request.content_html.as_deref(), &request.content)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("DOCX export task failed: {e}")))?;

    docx_attachment(title, blocks, page_size, margins).await
}

/// POST /api/export/pdf
pub async fn handle_export_pdf(Json(request): Json<PdfExportRequest>) -> Result<Response, AppError> {
    let title = request.title.unwrap_or_else(|| DEFAULT_TITLE.to_string());
    pdf_attachment(&title, request.content).await
}

/// Builds the DOCX on the blocking pool and wraps it as a download.
pub async fn docx_attachment(
    title: String,
    blocks: Vec<Block>,
    page_size: PageSize,
    margins: Margins,
) -> Result<Response, AppError> {
    let filename = format!("{}.docx", sanitize_filename(&title));
    let bytes = tokio::task::spawn_blocking(move || docx::build_docx(&title, &blocks, page_size, margins))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("DOCX export task failed: {e}")))??;

    info!(filename = %filename, bytes = bytes.len(), "DOCX exported");
    attachment(docx::CONTENT_TYPE, &filename, bytes, false)
}

/// Builds the PDF on the blocking pool and wraps it as a non-cacheable download.
pub async fn pdf_attachment(title: &str, content: String) -> Result<Response, AppError> {
    let title = pdf::display_title(title);
    let filename = format!("{}.pdf", sanitize_filename(&title).to_lowercase());

    let bytes = tokio::task::spawn_blocking(move || pdf::build_pdf(&title, &content))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF export task failed: {e}")))??;

    info!(filename = %filename, bytes = bytes.len(), "PDF exported");
    attachment(pdf::CONTENT_TYPE, &filename, bytes, true)
}

fn attachment(
    content_type: &'static str,
    filename: &str,
    bytes: Vec<u8>,
    no_store: bool,
) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid filename header: {e}")))?;

    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        bytes,
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if no_store {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }
    Ok(response)
}
