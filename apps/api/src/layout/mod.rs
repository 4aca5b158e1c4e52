// Pagination engine: virtual block tree, pluggable measurement, page flow and
// the preview overlay (markers, ruler, scroll snap).
// The layout pass is CPU-bound and must run inside tokio::task::spawn_blocking.

pub mod blocks;
pub mod font_metrics;
pub mod geometry;
pub mod handlers;
pub mod measure;
pub mod overlay;
pub mod paginate;

// Re-export the public API consumed by other modules (exporters, editor, handlers).
pub use blocks::{document_blocks, Block};
pub use geometry::{LayoutOptions, Margins, PageGeometry, PageSize};
pub use measure::{BlockMeasurer, MetricMeasurer, TextStyle};
pub use paginate::{paginate, Pagination};
