//! Box tree produced by layout

use crate::{BoxEdges, Rect};
use doc_model::{ComputedStyle, ElementData, NodeId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What a box knows about the element it came from.
///
/// Only used to classify boxes (table rows, headers, footers). Boxes never
/// own or reach back into the styled tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
    pub id: NodeId,
    pub tag: String,
    #[serde(default)]
    pub class: Option<String>,
}

impl SourceNode {
    pub fn new(id: NodeId, element: &ElementData) -> Self {
        Self {
            id,
            tag: element.tag.clone(),
            class: element.attribute("class").map(str::to_string),
        }
    }
}

/// Content of an inline box: a text leaf or a container, never both
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineContent {
    Text(String),
    Children(Vec<LayoutBox>),
}

/// Variant-specific part of a box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxKind {
    Block { children: Vec<LayoutBox> },
    Inline(InlineContent),
    Image { src: String },
}

/// A positioned box.
///
/// `rect` is the border box in absolute coordinates; margins lie outside it.
/// Style is shared with every clone of the box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub rect: Rect,
    #[serde(default)]
    pub margin: BoxEdges,
    #[serde(default)]
    pub border: BoxEdges,
    #[serde(default)]
    pub padding: BoxEdges,
    pub style: Arc<ComputedStyle>,
    #[serde(default)]
    pub source: Option<SourceNode>,
    pub kind: BoxKind,
}

impl LayoutBox {
    pub fn new(kind: BoxKind, style: Arc<ComputedStyle>) -> Self {
        Self {
            rect: Rect::default(),
            margin: BoxEdges::zero(),
            border: BoxEdges::zero(),
            padding: BoxEdges::zero(),
            style,
            source: None,
            kind,
        }
    }

    /// Empty block box
    pub fn block(style: Arc<ComputedStyle>) -> Self {
        Self::new(BoxKind::Block { children: Vec::new() }, style)
    }

    /// Inline text leaf
    pub fn text(text: impl Into<String>, style: Arc<ComputedStyle>) -> Self {
        Self::new(BoxKind::Inline(InlineContent::Text(text.into())), style)
    }

    pub fn image(src: impl Into<String>, style: Arc<ComputedStyle>) -> Self {
        Self::new(BoxKind::Image { src: src.into() }, style)
    }

    pub fn with_source(mut self, source: SourceNode) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Content box: the border box minus border and padding
    pub fn content_rect(&self) -> Rect {
        self.rect.inset(&self.border.plus(&self.padding))
    }

    /// Bottom of the margin box, where the next sibling starts stacking
    pub fn bottom_edge(&self) -> f32 {
        self.rect.bottom() + self.margin.bottom
    }

    pub fn is_block(&self) -> bool {
        matches!(self.kind, BoxKind::Block { .. })
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.kind, BoxKind::Inline(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, BoxKind::Image { .. })
    }

    /// Literal text of an inline leaf
    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            BoxKind::Inline(InlineContent::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn children(&self) -> &[LayoutBox] {
        match &self.kind {
            BoxKind::Block { children } | BoxKind::Inline(InlineContent::Children(children)) => children,
            BoxKind::Inline(InlineContent::Text(_)) | BoxKind::Image { .. } => &[],
        }
    }

    /// Mutable child list, `None` for leaves
    pub fn children_mut(&mut self) -> Option<&mut Vec<LayoutBox>> {
        match &mut self.kind {
            BoxKind::Block { children } | BoxKind::Inline(InlineContent::Children(children)) => Some(children),
            BoxKind::Inline(InlineContent::Text(_)) | BoxKind::Image { .. } => None,
        }
    }

    /// All boxes below this one in pre-order, excluding `self`
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children().iter().rev().collect(),
        }
    }

    /// Move this box and its whole subtree
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.rect = self.rect.translated(dx, dy);
        if let Some(children) = self.children_mut() {
            for child in children {
                child.translate(dx, dy);
            }
        }
    }

    /// Copy of this box without its children.
    ///
    /// Pages hold flattened boxes, so each page entry is a detached copy;
    /// the style map is shared, not duplicated.
    pub fn detached(&self) -> LayoutBox {
        let kind = match &self.kind {
            BoxKind::Block { .. } => BoxKind::Block { children: Vec::new() },
            BoxKind::Inline(InlineContent::Children(_)) => BoxKind::Inline(InlineContent::Children(Vec::new())),
            BoxKind::Inline(InlineContent::Text(text)) => BoxKind::Inline(InlineContent::Text(text.clone())),
            BoxKind::Image { src } => BoxKind::Image { src: src.clone() },
        };
        LayoutBox {
            rect: self.rect,
            margin: self.margin,
            border: self.border,
            padding: self.padding,
            style: Arc::clone(&self.style),
            source: self.source.clone(),
            kind,
        }
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.source.as_ref().map(|s| s.id)
    }

    pub fn tag(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.tag.as_str())
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Whether any class token contains `needle` (case-insensitive)
    pub fn has_class_containing(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_lowercase();
        self.source
            .as_ref()
            .and_then(|s| s.class.as_deref())
            .is_some_and(|class| {
                class
                    .split_whitespace()
                    .any(|token| token.to_ascii_lowercase().contains(&needle))
            })
    }
}

/// Pre-order iterator over a box's descendants
pub struct Descendants<'a> {
    stack: Vec<&'a LayoutBox>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a LayoutBox;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children().iter().rev());
        Some(next)
    }
}
