//! Text measurement
//!
//! Layout never asks "how wide is this" through global state. Each conversion
//! is handed a [`TextMeasurer`] and every call names the face it wants, so a
//! measurer can be shared between threads and reused across documents.

use crate::{advance_units, FontSpec, UNITS_PER_EM};
use unicode_segmentation::UnicodeSegmentation;

/// Width of a run of text set in a given face
pub trait TextMeasurer: Send + Sync {
    /// Advance width of `text` in layout units
    fn measure(&self, text: &str, font: &FontSpec) -> f32;

    /// Width of a single space in `font`
    fn space_width(&self, font: &FontSpec) -> f32 {
        self.measure(" ", font)
    }
}

/// Measures with the built-in core font width tables.
///
/// Each grapheme cluster advances by the width of its first character, so a
/// base letter followed by combining marks counts once.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFontMetrics;

impl StandardFontMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl TextMeasurer for StandardFontMetrics {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        let units: u32 = text
            .graphemes(true)
            .filter_map(|cluster| cluster.chars().next())
            .map(|ch| advance_units(font, ch) as u32)
            .sum();
        units as f32 * font.size / UNITS_PER_EM
    }
}

/// Every grapheme is `advance_em` ems wide
#[derive(Debug, Clone, Copy)]
pub struct FixedAdvanceMeasurer {
    pub advance_em: f32,
}

impl FixedAdvanceMeasurer {
    pub fn new(advance_em: f32) -> Self {
        Self { advance_em }
    }
}

impl Default for FixedAdvanceMeasurer {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TextMeasurer for FixedAdvanceMeasurer {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        text.graphemes(true).count() as f32 * self.advance_em * font.size
    }
}
