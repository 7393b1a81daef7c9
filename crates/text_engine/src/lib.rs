//! Text Engine - Font selection and text measurement
//!
//! Provides the measurement capability layout is parameterized with.
//!
//! # Modules
//!
//! - `font`: Font selection from CSS-like values
//! - `metrics`: Core font advance width tables
//! - `measure`: The `TextMeasurer` trait and its implementations

mod font;
mod measure;
mod metrics;

pub use font::*;
pub use measure::*;
pub use metrics::*;
