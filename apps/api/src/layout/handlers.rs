use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::layout::blocks::{document_blocks, Block};
use crate::layout::geometry::{LayoutOptions, PageGeometry};
use crate::layout::measure::{MetricMeasurer, TextStyle};
use crate::layout::overlay::{page_markers, PageMarker, Ruler, PAGE_GAP_PX};
use crate::layout::paginate::{paginate, Page};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginateRequest {
    #[serde(default)]
    pub content: String,
    pub content_html: Option<String>,
    pub layout: Option<LayoutOptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginateResponse {
    pub page_count: usize,
    pub content_area_height_px: f32,
    pub content_area_width_px: f32,
    pub degraded: bool,
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
    pub markers: Vec<PageMarker>,
    pub ruler: Ruler,
}

/// POST /api/layout/paginate
///
/// Flows the submitted document onto pages and returns the page list plus the
/// preview overlay (page markers and ruler). The pass runs on the blocking pool.
pub async fn handle_paginate(
    State(state): State<AppState>,
    Json(body): Json<PaginateRequest>,
) -> Result<Json<PaginateResponse>, AppError> {
    let geometry = PageGeometry::from_layout(body.layout.as_ref());
    let style = state.text_style.clone();

    let response = tokio::task::spawn_blocking(move || {
        run_layout(body.content_html.as_deref(), &body.content, geometry, style)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("layout task panicked: {e}")))?;

    info!(
        pages = response.page_count,
        degraded = response.degraded,
        "Layout pass served"
    );
    Ok(Json(response))
}

/// Synchronous core of the endpoint: parse, measure, paginate, annotate.
pub fn run_layout(
    html: Option<&str>,
    text: &str,
    geometry: PageGeometry,
    style: TextStyle,
) -> PaginateResponse {
    layout_blocks(&document_blocks(html, text), geometry, style)
}

/// Paginates an already-built block list and annotates the result.
pub fn layout_blocks(blocks: &[Block], geometry: PageGeometry, style: TextStyle) -> PaginateResponse {
    let measurer = MetricMeasurer::new(style);
    let pagination = paginate(blocks, &geometry, &measurer);
    let page_count = pagination.page_count();

    PaginateResponse {
        page_count,
        content_area_height_px: pagination.content_height_px,
        content_area_width_px: pagination.content_width_px,
        degraded: pagination.degraded,
        markers: page_markers(page_count, &geometry, PAGE_GAP_PX),
        ruler: Ruler::new(&geometry),
        geometry,
        pages: pagination.pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_layout_empty_document() {
        let resp = run_layout(None, "", PageGeometry::default(), TextStyle::default());
        assert_eq!(resp.page_count, 1);
        assert_eq!(resp.content_area_height_px, 930.0);
        assert_eq!(resp.content_area_width_px, 602.0);
        assert_eq!(resp.markers.len(), 1);
    }

    #[test]
    fn test_run_layout_long_text_spans_pages() {
        let text = "Kalimat contoh untuk mengisi halaman makalah. ".repeat(600);
        let resp = run_layout(None, &text, PageGeometry::default(), TextStyle::default());
        assert!(resp.page_count > 1);
        assert_eq!(resp.markers.len(), resp.page_count);
        assert_eq!(resp.markers.last().unwrap().label, format!("{0} / {0}", resp.page_count));
    }

    #[test]
    fn test_run_layout_honours_page_break_html() {
        let html = "<p>Satu</p><hr class=\"page-break\"><p>Dua</p>";
        let resp = run_layout(Some(html), "", PageGeometry::default(), TextStyle::default());
        assert_eq!(resp.page_count, 2);
    }

    #[test]
    fn test_run_layout_three_short_paragraphs_one_page() {
        use crate::layout::geometry::{Margins, PageSize};

        let geometry = PageGeometry::new(PageSize::A4Portrait, Margins::uniform(96.0), 1.0, 1.5);
        let html = "<p>Paragraf pertama.</p><p>Paragraf kedua.</p><p>Paragraf ketiga.</p>";
        let resp = run_layout(Some(html), "", geometry, TextStyle::default());
        assert_eq!(resp.page_count, 1);
        let order: Vec<usize> = resp.pages[0].blocks.iter().map(|b| b.source_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }
}
