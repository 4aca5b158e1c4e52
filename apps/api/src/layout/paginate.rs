//! Pagination pass. Flows measured blocks onto fixed-height pages.
//!
//! Every call is a full recompute from the block list; nothing is carried over
//! between passes. Only paragraphs are split across pages, at word boundaries.
//! Any other block taller than a page lands whole on its own page, flagged
//! `overflow`.

use serde::Serialize;
use tracing::{debug, warn};

use super::blocks::Block;
use super::geometry::PageGeometry;
use super::measure::{BlockMeasurer, MeasureContext, MeasureError};

/// Slack allowed when testing whether a block fits, absorbing sub-pixel rounding.
pub const FIT_TOLERANCE_PX: f32 = 1.0;

/// Position of a paragraph fragment within its source paragraph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// 0-based part number.
    pub part: usize,
    pub first_word: usize,
    pub word_count: usize,
    /// True when more of the paragraph follows on a later page.
    pub continues: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedBlock {
    /// Index of the block in the input list.
    pub source_index: usize,
    pub block: Block,
    pub height_px: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<Fragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub index: usize,
    pub blocks: Vec<PlacedBlock>,
    pub used_height_px: f32,
    pub overflow: bool,
}

impl Page {
    fn new(index: usize) -> Self {
        Self {
            index,
            blocks: Vec::new(),
            used_height_px: 0.0,
            overflow: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Result of one layout pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub pages: Vec<Page>,
    pub content_height_px: f32,
    pub content_width_px: f32,
    /// True when measurement failed and every block was left on a single page.
    pub degraded: bool,
}

impl Pagination {
    /// Number of pages; at least 1, an empty document still shows one page.
    pub fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }
}

/// Flows `blocks` onto pages of `geometry`'s content area.
///
/// Never fails: a measurement error is logged and the pass degrades to a
/// single page holding every block unflowed.
pub fn paginate<M>(blocks: &[Block], geometry: &PageGeometry, measurer: &M) -> Pagination
where
    M: BlockMeasurer + ?Sized,
{
    match flow(blocks, geometry, measurer) {
        Ok(pagination) => {
            debug!(
                blocks = blocks.len(),
                pages = pagination.page_count(),
                "Pagination complete"
            );
            pagination
        }
        Err(e) => {
            warn!(error = %e, blocks = blocks.len(), "Measurement failed, document left on a single page");
            unflowed(blocks, geometry)
        }
    }
}

fn unflowed(blocks: &[Block], geometry: &PageGeometry) -> Pagination {
    let mut page = Page::new(0);
    page.blocks = blocks
        .iter()
        .enumerate()
        .map(|(i, block)| PlacedBlock {
            source_index: i,
            block: block.clone(),
            height_px: 0.0,
            fragment: None,
        })
        .collect();
    Pagination {
        pages: vec![page],
        content_height_px: geometry.content_area_height(),
        content_width_px: geometry.content_area_width(),
        degraded: true,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Flow state
// ────────────────────────────────────────────────────────────────────────────

struct Flow<'a, M: ?Sized> {
    measurer: &'a M,
    ctx: MeasureContext,
    available: f32,
    pages: Vec<Page>,
}

impl<'a, M> Flow<'a, M>
where
    M: BlockMeasurer + ?Sized,
{
    fn new(geometry: &PageGeometry, measurer: &'a M) -> Self {
        Self {
            measurer,
            ctx: MeasureContext {
                width_px: geometry.content_area_width(),
                line_spacing: geometry.line_spacing,
                zoom: geometry.zoom,
            },
            available: geometry.content_area_height(),
            pages: vec![Page::new(0)],
        }
    }

    fn current(&self) -> &Page {
        // `pages` starts with one page and only grows.
        &self.pages[self.pages.len() - 1]
    }

    fn new_page(&mut self) {
        let index = self.pages.len();
        self.pages.push(Page::new(index));
    }

    fn fits(&self, used: f32, height: f32) -> bool {
        used + height <= self.available + FIT_TOLERANCE_PX
    }

    fn measure(&self, block: &Block) -> Result<f32, MeasureError> {
        let h = self.measurer.measure(block, &self.ctx)?;
        if h.is_finite() && h >= 0.0 {
            Ok(h)
        } else {
            Err(MeasureError::InvalidHeight(h))
        }
    }

    fn place(&mut self, source_index: usize, block: Block, height_px: f32, fragment: Option<Fragment>) {
        let limit = self.available + FIT_TOLERANCE_PX;
        let last = self.pages.len() - 1;
        let page = &mut self.pages[last];
        page.used_height_px += height_px;
        if page.used_height_px > limit {
            page.overflow = true;
        }
        page.blocks.push(PlacedBlock {
            source_index,
            block,
            height_px,
            fragment,
        });
    }

    /// Splits a paragraph that cannot fit a fresh page. The current page is
    /// empty on entry.
    fn split_paragraph(&mut self, source_index: usize, text: &str) -> Result<(), MeasureError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            let h = self.measure(&Block::paragraph(""))?;
            self.place(source_index, Block::paragraph(""), h, None);
            return Ok(());
        }

        let mut start = 0;
        let mut part = 0;
        while start < words.len() {
            let remaining = &words[start..];
            let take = self.longest_fitting_prefix(remaining)?;
            let end = start + take;
            let fragment_text = words[start..end].join(" ");
            let block = Block::paragraph(fragment_text);
            let h = self.measure(&block)?;
            self.place(
                source_index,
                block,
                h,
                Some(Fragment {
                    part,
                    first_word: start,
                    word_count: take,
                    continues: end < words.len(),
                }),
            );
            start = end;
            part += 1;
            if start < words.len() {
                self.new_page();
            }
        }
        Ok(())
    }

    /// Largest `k` such that the first `k` words fit an empty page; at least 1,
    /// so a single word taller than the page still advances the pass.
    fn longest_fitting_prefix(&self, words: &[&str]) -> Result<usize, MeasureError> {
        let (mut lo, mut hi) = (0usize, words.len());
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let h = self.measure(&Block::paragraph(words[..mid].join(" ")))?;
            if self.fits(0.0, h) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Ok(lo.max(1))
    }

    fn finish(self) -> Pagination {
        Pagination {
            content_height_px: self.available,
            content_width_px: self.ctx.width_px,
            pages: self.pages,
            degraded: false,
        }
    }
}

fn flow<M>(blocks: &[Block], geometry: &PageGeometry, measurer: &M) -> Result<Pagination, MeasureError>
where
    M: BlockMeasurer + ?Sized,
{
    let mut flow = Flow::new(geometry, measurer);

    for (i, block) in blocks.iter().enumerate() {
        if block.is_page_break() {
            flow.place(i, Block::PageBreak, 0.0, None);
            flow.new_page();
            continue;
        }

        let h = flow.measure(block)?;
        if flow.fits(flow.current().used_height_px, h) {
            flow.place(i, block.clone(), h, None);
            continue;
        }

        if !flow.current().is_empty() {
            flow.new_page();
        }
        if flow.fits(0.0, h) {
            flow.place(i, block.clone(), h, None);
            continue;
        }

        match block {
            Block::Paragraph { text } => flow.split_paragraph(i, text)?,
            other => flow.place(i, other.clone(), h, None),
        }
    }

    Ok(flow.finish())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
