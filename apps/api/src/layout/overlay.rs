//! Preview overlay bookkeeping: page offsets, "n / total" markers, the
//! horizontal ruler and debounced snap-to-page scrolling.
//!
//! Everything here is derived from `PageGeometry` and a page count; the
//! pagination pass itself is unaware of it.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::geometry::{PageGeometry, CSS_DPI};

/// Vertical gap between stacked pages on the preview surface, in screen px.
pub const PAGE_GAP_PX: f32 = 24.0;
/// Time the scroll position must stay untouched before snapping.
pub const SNAP_SETTLE: Duration = Duration::from_millis(150);

const CM_PER_INCH: f32 = 2.54;

pub fn px_per_cm() -> f32 {
    CSS_DPI / CM_PER_INCH
}

// ────────────────────────────────────────────────────────────────────────────
// Page offsets and markers
// ────────────────────────────────────────────────────────────────────────────

fn page_stride(geometry: &PageGeometry, gap_px: f32) -> f32 {
    geometry.height_px * geometry.zoom + gap_px
}

/// Top edge of every page on the preview surface.
pub fn page_offsets(page_count: usize, geometry: &PageGeometry, gap_px: f32) -> Vec<f32> {
    let stride = page_stride(geometry, gap_px);
    (0..page_count.max(1)).map(|i| i as f32 * stride).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMarker {
    pub index: usize,
    pub label: String,
    pub top_px: f32,
}

pub fn page_markers(page_count: usize, geometry: &PageGeometry, gap_px: f32) -> Vec<PageMarker> {
    let total = page_count.max(1);
    page_offsets(total, geometry, gap_px)
        .into_iter()
        .enumerate()
        .map(|(index, top_px)| PageMarker {
            index,
            label: format!("{} / {}", index + 1, total),
            top_px,
        })
        .collect()
}

/// Page whose top edge is nearest to `offset_px`, clamped to the document.
pub fn page_at_offset(offset_px: f32, page_count: usize, geometry: &PageGeometry, gap_px: f32) -> usize {
    let stride = page_stride(geometry, gap_px);
    let last = page_count.max(1) - 1;
    if !offset_px.is_finite() || offset_px <= 0.0 || stride <= 0.0 {
        return 0;
    }
    ((offset_px / stride).round() as usize).min(last)
}

// ────────────────────────────────────────────────────────────────────────────
// Ruler
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulerTick {
    pub position_px: f32,
    pub major: bool,
    /// Whole-centimetre label on major ticks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<u32>,
}

/// Horizontal ruler across the full page width. Ticks every half centimetre,
/// labelled every centimetre; all positions in screen px (zoom applied).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ruler {
    pub width_px: f32,
    pub ticks: Vec<RulerTick>,
    pub margin_left_px: f32,
    pub margin_right_px: f32,
}

impl Ruler {
    pub fn new(geometry: &PageGeometry) -> Self {
        let zoom = geometry.zoom;
        let half_cm = px_per_cm() / 2.0;
        let steps = (geometry.width_px / half_cm).floor() as u32;

        let ticks = (0..=steps)
            .map(|i| {
                let major = i % 2 == 0;
                RulerTick {
                    position_px: i as f32 * half_cm * zoom,
                    major,
                    label: major.then_some(i / 2),
                }
            })
            .collect();

        Self {
            width_px: geometry.width_px * zoom,
            ticks,
            margin_left_px: geometry.margins.left * zoom,
            margin_right_px: (geometry.width_px - geometry.margins.right).max(0.0) * zoom,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scroll snap
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapTarget {
    pub page_index: usize,
    pub top_px: f32,
}

#[derive(Debug, Clone, Copy)]
struct PendingScroll {
    offset_px: f32,
    at: Instant,
}

/// Debounced snap-to-page. Each scroll replaces the pending one, so only the
/// most recent position can settle.
#[derive(Debug, Clone)]
pub struct ScrollSnap {
    settle: Duration,
    gap_px: f32,
    pending: Option<PendingScroll>,
}

impl Default for ScrollSnap {
    fn default() -> Self {
        Self::new(SNAP_SETTLE, PAGE_GAP_PX)
    }
}

impl ScrollSnap {
    pub fn new(settle: Duration, gap_px: f32) -> Self {
        Self {
            settle,
            gap_px,
            pending: None,
        }
    }

    pub fn on_scroll(&mut self, offset_px: f32, now: Instant) {
        self.pending = Some(PendingScroll { offset_px, at: now });
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns the snap target once the latest scroll has settled, consuming it.
    pub fn poll(&mut self, now: Instant, page_count: usize, geometry: &PageGeometry) -> Option<SnapTarget> {
        let pending = self.pending?;
        if now.saturating_duration_since(pending.at) < self.settle {
            return None;
        }
        self.pending = None;
        let page_index = page_at_offset(pending.offset_px, page_count, geometry, self.gap_px);
        let top_px = page_index as f32 * page_stride(geometry, self.gap_px);
        Some(SnapTarget { page_index, top_px })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offsets_scale_with_zoom() {
        let mut g = PageGeometry::default();
        assert_eq!(page_offsets(3, &g, 24.0), vec![0.0, 1146.0, 2292.0]);
        g.zoom = 0.5;
        assert_eq!(page_offsets(2, &g, 24.0), vec![0.0, 585.0]);
    }

    #[test]
    fn test_markers_label_n_of_total() {
        let markers = page_markers(3, &PageGeometry::default(), PAGE_GAP_PX);
        let labels: Vec<&str> = markers.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["1 / 3", "2 / 3", "3 / 3"]);
    }

    #[test]
    fn test_zero_pages_still_marks_one() {
        let markers = page_markers(0, &PageGeometry::default(), PAGE_GAP_PX);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].label, "1 / 1");
    }

    #[test]
    fn test_page_at_offset_rounds_and_clamps() {
        let g = PageGeometry::default();
        assert_eq!(page_at_offset(0.0, 5, &g, 24.0), 0);
        assert_eq!(page_at_offset(500.0, 5, &g, 24.0), 0);
        assert_eq!(page_at_offset(700.0, 5, &g, 24.0), 1);
        assert_eq!(page_at_offset(1e9, 5, &g, 24.0), 4);
        assert_eq!(page_at_offset(-40.0, 5, &g, 24.0), 0);
    }

    #[test]
    fn test_ruler_ticks_every_half_centimetre() {
        let g = PageGeometry::default();
        let ruler = Ruler::new(&g);
        assert_eq!(ruler.ticks[0].position_px, 0.0);
        assert_eq!(ruler.ticks[0].label, Some(0));
        let step = ruler.ticks[1].position_px - ruler.ticks[0].position_px;
        assert!((step - px_per_cm() / 2.0).abs() < 1e-3);
        assert!(!ruler.ticks[1].major);
        assert_eq!(ruler.ticks[2].label, Some(1));
        assert!(ruler.ticks.last().unwrap().position_px <= ruler.width_px);
        // A4 is 21cm wide.
        assert_eq!(ruler.ticks.iter().filter(|t| t.major).count(), 22);
    }

    #[test]
    fn test_ruler_margin_markers() {
        let ruler = Ruler::new(&PageGeometry::default());
        assert_eq!(ruler.margin_left_px, 96.0);
        assert_eq!(ruler.margin_right_px, 698.0);
    }

    #[test]
    fn test_scroll_snap_waits_for_settle() {
        let g = PageGeometry::default();
        let mut snap = ScrollSnap::default();
        let t0 = Instant::now();
        snap.on_scroll(1300.0, t0);
        assert_eq!(snap.poll(t0 + Duration::from_millis(100), 4, &g), None);
        let target = snap.poll(t0 + Duration::from_millis(150), 4, &g).unwrap();
        assert_eq!(target.page_index, 1);
        assert_eq!(target.top_px, 1146.0);
        assert!(!snap.is_pending());
    }

    #[test]
    fn test_scroll_snap_only_latest_scroll_settles() {
        let g = PageGeometry::default();
        let mut snap = ScrollSnap::default();
        let t0 = Instant::now();
        snap.on_scroll(100.0, t0);
        snap.on_scroll(2400.0, t0 + Duration::from_millis(120));
        // 180ms after the first scroll but only 60ms after the latest.
        assert_eq!(snap.poll(t0 + Duration::from_millis(180), 4, &g), None);
        let target = snap.poll(t0 + Duration::from_millis(300), 4, &g).unwrap();
        assert_eq!(target.page_index, 2);
    }

    #[test]
    fn test_scroll_snap_without_scroll_is_idle() {
        let mut snap = ScrollSnap::default();
        assert_eq!(snap.poll(Instant::now(), 3, &PageGeometry::default()), None);
    }
}
