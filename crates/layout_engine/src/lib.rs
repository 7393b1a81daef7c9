//! Layout Engine - box construction, line breaking, tables, and pagination
//!
//! This crate converts a styled document tree into positioned boxes and then
//! splits those boxes into fixed-size pages ready for rendering.

mod block;
mod error;
mod geometry;
mod inline;
mod layout_box;
mod length;
mod paginator;
mod table;

pub use block::*;
pub use error::*;
pub use geometry::*;
pub use inline::*;
pub use layout_box::*;
pub use length::*;
pub use paginator::*;
pub use table::*;

use doc_model::StyledTree;
use text_engine::TextMeasurer;

/// Lay out a styled tree and paginate the result.
///
/// Layout runs against the page's content width, so boxes come out already
/// in page coordinates horizontally.
pub fn convert(tree: &StyledTree, measurer: &dyn TextMeasurer, config: &PageConfig) -> Result<Vec<Page>> {
    config.validate()?;
    let root = LayoutEngine::new(measurer, LayoutConfig::from_page(config)).layout(tree)?;
    Paginator::new(config.clone()).paginate(&root)
}
