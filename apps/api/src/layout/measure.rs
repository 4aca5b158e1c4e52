//! Block measurement: the pluggable height oracle the pagination pass consults.
//!
//! `MetricMeasurer` estimates rendered heights from static font metrics and a
//! greedy word wrap. Any other implementation (a headless renderer, a fixed-width
//! test double) plugs in through `BlockMeasurer`.

use thiserror::Error;

use super::blocks::Block;
use super::font_metrics::{get_metrics, FontFamily};

#[derive(Debug, Error)]
pub enum MeasureError {
    #[error("content width must be finite and non-negative, got {0}")]
    InvalidWidth(f32),

    #[error("measured height must be finite and non-negative, got {0}")]
    InvalidHeight(f32),

    #[error("measurement unavailable: {0}")]
    Unavailable(String),
}

/// Inputs that affect how tall a block renders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureContext {
    /// Content-box width, already scaled by zoom.
    pub width_px: f32,
    pub line_spacing: f32,
    pub zoom: f32,
}

/// Height oracle for one block at a given content width.
///
/// Heights must be monotonic in text length for paragraphs: a word prefix never
/// measures taller than the full text.
pub trait BlockMeasurer: Send + Sync {
    fn measure(&self, block: &Block, ctx: &MeasureContext) -> Result<f32, MeasureError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Text style
// ────────────────────────────────────────────────────────────────────────────

/// Typographic parameters at zoom 1.0, in CSS pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub body_font: FontFamily,
    pub heading_font: FontFamily,
    pub base_font_px: f32,
    /// Multipliers of `base_font_px` for h1..h6.
    pub heading_scale: [f32; 6],
    /// Vertical space after every block.
    pub block_spacing_px: f32,
    pub list_indent_px: f32,
    pub quote_indent_px: f32,
    pub cell_padding_px: f32,
    pub default_image_height_px: f32,
    /// Monospace advance as a fraction of the font size.
    pub code_char_width_em: f32,
    pub code_line_spacing: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            body_font: FontFamily::TimesRoman,
            heading_font: FontFamily::TimesBold,
            base_font_px: 16.0,
            heading_scale: [2.0, 1.5, 1.17, 1.0, 0.83, 0.67],
            block_spacing_px: 8.0,
            list_indent_px: 40.0,
            quote_indent_px: 40.0,
            cell_padding_px: 4.0,
            default_image_height_px: 200.0,
            code_char_width_em: 0.6,
            code_line_spacing: 1.2,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Metric measurer
// ────────────────────────────────────────────────────────────────────────────

/// Font-metric height estimator. Font sizes scale with zoom, so content and the
/// content box shrink or grow together.
#[derive(Debug, Clone, Default)]
pub struct MetricMeasurer {
    style: TextStyle,
}

impl MetricMeasurer {
    pub fn new(style: TextStyle) -> Self {
        Self { style }
    }

    /// Height of wrapped text: `lines × font × spacing`. Empty text still takes
    /// one line, as an empty editor paragraph does.
    fn text_height(&self, text: &str, font: FontFamily, font_px: f32, width_px: f32, spacing: f32) -> f32 {
        let max_em = if font_px > 0.0 { width_px / font_px } else { 0.0 };
        let lines = get_metrics(font).line_count(text, max_em).max(1);
        lines as f32 * font_px * spacing
    }

    fn code_height(&self, text: &str, font_px: f32, width_px: f32) -> f32 {
        let char_px = font_px * self.style.code_char_width_em;
        let per_line = if char_px > 0.0 {
            (width_px / char_px).floor().max(1.0) as usize
        } else {
            1
        };
        let lines: usize = text
            .split('\n')
            .map(|line| line.chars().count().div_ceil(per_line).max(1))
            .sum();
        lines.max(1) as f32 * font_px * self.style.code_line_spacing
    }
}

impl BlockMeasurer for MetricMeasurer {
    fn measure(&self, block: &Block, ctx: &MeasureContext) -> Result<f32, MeasureError> {
        if !ctx.width_px.is_finite() || ctx.width_px < 0.0 {
            return Err(MeasureError::InvalidWidth(ctx.width_px));
        }
        let s = &self.style;
        let zoom = ctx.zoom;
        let font_px = s.base_font_px * zoom;
        let spacing = s.block_spacing_px * zoom;
        let width = ctx.width_px;

        let height = match block {
            Block::PageBreak => return Ok(0.0),
            Block::Paragraph { text } => {
                self.text_height(text, s.body_font, font_px, width, ctx.line_spacing) + spacing
            }
            Block::Heading { level, text } => {
                let idx = (*level).clamp(1, 6) as usize - 1;
                let heading_px = font_px * s.heading_scale[idx];
                self.text_height(text, s.heading_font, heading_px, width, ctx.line_spacing) + spacing
            }
            Block::Quote { text } => {
                let inner = (width - s.quote_indent_px * zoom).max(0.0);
                self.text_height(text, s.body_font, font_px, inner, ctx.line_spacing) + spacing
            }
            Block::List { items, .. } => {
                let inner = (width - s.list_indent_px * zoom).max(0.0);
                let body: f32 = items
                    .iter()
                    .map(|item| self.text_height(item, s.body_font, font_px, inner, ctx.line_spacing))
                    .sum();
                body + spacing
            }
            Block::Table { rows } => {
                let padding = s.cell_padding_px * zoom;
                let body: f32 = rows
                    .iter()
                    .map(|row| {
                        let cols = row.len().max(1) as f32;
                        let cell_w = (width / cols - 2.0 * padding).max(0.0);
                        let tallest = row
                            .iter()
                            .map(|cell| self.text_height(cell, s.body_font, font_px, cell_w, ctx.line_spacing))
                            .fold(font_px * ctx.line_spacing, f32::max);
                        tallest + 2.0 * padding
                    })
                    .sum();
                body + spacing
            }
            Block::Image { height_px, .. } => {
                height_px.unwrap_or(s.default_image_height_px) * zoom + spacing
            }
            Block::Code { text } => self.code_height(text, font_px, width) + spacing,
        };

        if height.is_finite() && height >= 0.0 {
            Ok(height)
        } else {
            Err(MeasureError::InvalidHeight(height))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
