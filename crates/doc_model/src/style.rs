//! Resolved style properties
//!
//! The cascade runs upstream; by the time a tree reaches layout every element
//! carries a flat `name -> value` map of its resolved declarations. This module
//! only stores and reads those maps and knows which properties inherit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Properties that flow from a parent box to its children when the child does
/// not declare them itself.
pub const INHERITED_PROPERTIES: &[&str] = &[
    "border-collapse",
    "border-spacing",
    "color",
    "direction",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "letter-spacing",
    "line-height",
    "list-style",
    "list-style-position",
    "list-style-type",
    "text-align",
    "text-indent",
    "text-transform",
    "visibility",
    "white-space",
    "word-spacing",
];

/// A resolved style mapping for one element.
///
/// Keys are lower-case property names. Ordering is deterministic so two
/// conversions of the same tree serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `name: value; name: value` declaration block.
    ///
    /// Malformed declarations are skipped; the last declaration of a property
    /// wins.
    pub fn from_declarations(block: &str) -> Self {
        let mut style = Self::new();
        for decl in block.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            style.set(name, value.trim());
        }
        style
    }

    /// Builder-style setter
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// Raw value, even if empty
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Trimmed value; blank declarations count as absent
    pub fn get_trimmed(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_trimmed(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fill in inherited properties from `parent` that this style does not
    /// declare. Non-inherited properties (margins, widths, ...) never leak
    /// from parent to child.
    pub fn inherit_from(&self, parent: &ComputedStyle) -> ComputedStyle {
        let mut merged = self.clone();
        for &name in INHERITED_PROPERTIES {
            if merged.properties.contains_key(name) {
                continue;
            }
            if let Some(value) = parent.properties.get(name) {
                merged.properties.insert(name.to_string(), value.clone());
            }
        }
        merged
    }

    /// Overlay every declaration of `overrides` on top of this style
    pub fn merged_with(&self, overrides: &ComputedStyle) -> ComputedStyle {
        let mut merged = self.clone();
        for (k, v) in &overrides.properties {
            merged.properties.insert(k.clone(), v.clone());
        }
        merged
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for ComputedStyle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut style = Self::new();
        for (k, v) in iter {
            style.set(k.as_ref(), v);
        }
        style
    }
}
