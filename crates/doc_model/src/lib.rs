//! Document Model - styled node tree consumed by layout
//!
//! Markup parsing and the CSS cascade happen upstream. This crate holds what
//! they produce: a tree of elements and text nodes, each element carrying a
//! resolved style map, with stable node identities.

mod error;
mod node;
mod node_id;
mod style;
mod tree;

pub use error::*;
pub use node::*;
pub use node_id::*;
pub use style::*;
pub use tree::*;
