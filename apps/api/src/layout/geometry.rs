//! Page geometry: page size, margins, zoom and line spacing in CSS pixels.
//!
//! All lengths are device-independent pixels at 96 DPI. A4 dimensions are
//! derived once from the physical size in inches and swapped for landscape.
//! Export formats convert from this basis with fixed multipliers (see `px_to_twips`).

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Constants
// ────────────────────────────────────────────────────────────────────────────

pub const CSS_DPI: f32 = 96.0;
pub const A4_WIDTH_IN: f32 = 8.27;
pub const A4_HEIGHT_IN: f32 = 11.69;

/// Twentieths of a point per inch.
pub const TWIPS_PER_INCH: f32 = 1440.0;
/// 1440 twips/in ÷ 96 px/in.
pub const TWIPS_PER_PX: f32 = 15.0;

/// Default margin on every side: 96px = 1in.
pub const DEFAULT_MARGIN_PX: f32 = 96.0;
pub const DEFAULT_LINE_SPACING: f32 = 1.5;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

/// Supported page sizes. Serialized as the editor's short codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    #[serde(rename = "A4P")]
    A4Portrait,
    #[serde(rename = "A4L")]
    A4Landscape,
}

impl PageSize {
    /// `(width, height)` in CSS pixels.
    pub fn dimensions_px(self) -> (f32, f32) {
        let w = (A4_WIDTH_IN * CSS_DPI).round();
        let h = (A4_HEIGHT_IN * CSS_DPI).round();
        match self {
            PageSize::A4Portrait => (w, h),
            PageSize::A4Landscape => (h, w),
        }
    }

    /// `(width, height)` in twips, as written into a DOCX section.
    pub fn dimensions_twips(self) -> (u32, u32) {
        let w = (A4_WIDTH_IN * TWIPS_PER_INCH).round() as u32;
        let h = (A4_HEIGHT_IN * TWIPS_PER_INCH).round() as u32;
        match self {
            PageSize::A4Portrait => (w, h),
            PageSize::A4Landscape => (h, w),
        }
    }

    pub fn is_landscape(self) -> bool {
        matches!(self, PageSize::A4Landscape)
    }
}

/// Page margins in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN_PX)
    }
}

impl Margins {
    pub fn uniform(px: f32) -> Self {
        Self {
            top: px,
            right: px,
            bottom: px,
            left: px,
        }
    }

    /// Negative or non-finite values are treated as zero.
    pub fn sanitized(self) -> Self {
        let clean = |v: f32| if v.is_finite() { v.max(0.0) } else { 0.0 };
        Self {
            top: clean(self.top),
            right: clean(self.right),
            bottom: clean(self.bottom),
            left: clean(self.left),
        }
    }

    /// Margins converted to twips (`px × 15`), rounded.
    pub fn to_twips(self) -> TwipMargins {
        let m = self.sanitized();
        TwipMargins {
            top: px_to_twips(m.top),
            right: px_to_twips(m.right),
            bottom: px_to_twips(m.bottom),
            left: px_to_twips(m.left),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwipMargins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

pub fn px_to_twips(px: f32) -> u32 {
    (px.max(0.0) * TWIPS_PER_PX).round() as u32
}

/// Full geometry for one layout pass.
///
/// `width_px`/`height_px` are always derived from `size`; build via `PageGeometry::new`
/// or `PageGeometry::from_layout` rather than setting them by hand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGeometry {
    pub size: PageSize,
    pub width_px: f32,
    pub height_px: f32,
    pub margins: Margins,
    pub zoom: f32,
    pub line_spacing: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(PageSize::A4Portrait, Margins::default(), 1.0, DEFAULT_LINE_SPACING)
    }
}

impl PageGeometry {
    pub fn new(size: PageSize, margins: Margins, zoom: f32, line_spacing: f32) -> Self {
        let (width_px, height_px) = size.dimensions_px();
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
        let line_spacing = if line_spacing.is_finite() && line_spacing > 0.0 {
            line_spacing
        } else {
            DEFAULT_LINE_SPACING
        };
        Self {
            size,
            width_px,
            height_px,
            margins: margins.sanitized(),
            zoom,
            line_spacing,
        }
    }

    /// Builds geometry from the optional request-side layout options.
    pub fn from_layout(layout: Option<&LayoutOptions>) -> Self {
        match layout {
            Some(l) => Self::new(
                l.page_size.unwrap_or_default(),
                l.margins_px.unwrap_or_default(),
                l.zoom.unwrap_or(1.0),
                l.line_spacing.unwrap_or(DEFAULT_LINE_SPACING),
            ),
            None => Self::default(),
        }
    }

    /// `(height − top − bottom) × zoom`, clamped at zero when margins exceed the page.
    pub fn content_area_height(&self) -> f32 {
        (self.height_px - self.margins.top - self.margins.bottom).max(0.0) * self.zoom
    }

    /// `(width − left − right) × zoom`, clamped at zero.
    pub fn content_area_width(&self) -> f32 {
        (self.width_px - self.margins.left - self.margins.right).max(0.0) * self.zoom
    }
}

/// Layout options as sent by the editor alongside content.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOptions {
    pub page_size: Option<PageSize>,
    pub margins_px: Option<Margins>,
    pub zoom: Option<f32>,
    pub line_spacing: Option<f32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
