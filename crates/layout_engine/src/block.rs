//! Box builder and block formatting
//!
//! Walks the styled tree once, resolving box-model edges and stacking block
//! children vertically. Paragraph-like content is handed to the
//! [`InlineFormatter`], table rows to the row formatter.

use crate::{
    parse_length, resolve_border, resolve_edges, InlineFormatter, LayoutBox, LayoutError, PageConfig,
    Rect, Result, SourceNode,
};
use doc_model::{ComputedStyle, ElementData, NodeId, NodeKind, StyledTree};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use text_engine::TextMeasurer;

/// Tags laid out as blocks unless `display` says otherwise
pub const BLOCK_TAGS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "table", "thead", "tbody", "tfoot",
    "tr", "td", "th", "header", "footer", "section", "article", "form", "fieldset", "hr", "blockquote",
    "address", "main", "nav", "aside", "html", "body", "pre", "figure", "figcaption", "dl", "dt", "dd",
    "caption",
];

/// Tags that never produce boxes
pub const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "title", "meta", "link"];

/// Default size of an image without explicit dimensions
pub const DEFAULT_IMAGE_SIZE: f32 = 40.0;

/// How an element takes part in layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLevel {
    Block,
    Inline,
    /// External content such as `<img>`, stacked like a block
    Replaced,
}

/// Classify an element; `None` means it generates no box at all
pub fn display_level(element: &ElementData) -> Option<DisplayLevel> {
    if SKIPPED_TAGS.iter().any(|tag| element.is(tag)) {
        return None;
    }
    if element.is("img") {
        return Some(DisplayLevel::Replaced);
    }
    if let Some(display) = element.style.get_trimmed("display") {
        match display.to_ascii_lowercase().as_str() {
            "none" => return None,
            "block" | "flex" | "grid" | "list-item" => return Some(DisplayLevel::Block),
            d if d.starts_with("table") => return Some(DisplayLevel::Block),
            d if d.starts_with("inline") => return Some(DisplayLevel::Inline),
            _ => {}
        }
    }
    if BLOCK_TAGS.iter().any(|tag| element.is(tag)) {
        Some(DisplayLevel::Block)
    } else {
        Some(DisplayLevel::Inline)
    }
}

fn node_level(tree: &StyledTree, id: NodeId) -> Option<DisplayLevel> {
    match &tree.get(id)?.kind {
        NodeKind::Text(_) => Some(DisplayLevel::Inline),
        NodeKind::Element(element) => display_level(element),
    }
}

/// A declared `width`/`height`. Percentages need a positive basis.
pub(crate) fn declared_size(style: &ComputedStyle, name: &str, basis: f32) -> Option<f32> {
    let value = style.get_trimmed(name)?;
    if value.ends_with('%') && basis <= 0.0 {
        return None;
    }
    let size = parse_length(value, basis, -1.0);
    (size >= 0.0).then_some(size)
}

/// Geometry of the initial containing block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page_width: f32,
    pub margin_top: f32,
    pub margin_left: f32,
    pub margin_right: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::from_page(&PageConfig::default())
    }
}

impl LayoutConfig {
    /// Lay out against the same geometry the paginator will use
    pub fn from_page(page: &PageConfig) -> Self {
        Self {
            page_width: page.page_width,
            margin_top: page.margin_top,
            margin_left: page.margin_left,
            margin_right: page.margin_right,
        }
    }

    pub fn with_page_width(mut self, width: f32) -> Self {
        self.page_width = width;
        self
    }

    pub fn with_margins(mut self, top: f32, left: f32, right: f32) -> Self {
        self.margin_top = top;
        self.margin_left = left;
        self.margin_right = right;
        self
    }

    /// Width available to the content root
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }
}

/// Builds the box tree for a styled document
pub struct LayoutEngine<'a> {
    pub(crate) measurer: &'a dyn TextMeasurer,
    config: LayoutConfig,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(measurer: &'a dyn TextMeasurer, config: LayoutConfig) -> Self {
        Self { measurer, config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Lay out the whole document.
    ///
    /// The content root is `<body>` (looked up under `<html>`), or the tree
    /// root itself. The returned box has absolute geometry.
    pub fn layout(&self, tree: &StyledTree) -> Result<LayoutBox> {
        let width = self.config.content_width();
        if !width.is_finite() || width <= 0.0 || !self.config.margin_top.is_finite() {
            return Err(LayoutError::InvalidPageSetup(format!(
                "content width must be positive, got {width}"
            )));
        }

        let root = tree
            .root()
            .ok_or_else(|| LayoutError::LayoutFailed("styled tree has no root".into()))?;
        let (content_root, parent_style) = match tree.element(root) {
            Some(html) if html.is("html") => match tree.first_child_element(root, "body") {
                Some(body) => (body, html.style.clone()),
                None => (root, ComputedStyle::new()),
            },
            _ => (root, ComputedStyle::new()),
        };

        let root_box = self
            .layout_block(
                tree,
                content_root,
                &parent_style,
                self.config.margin_left,
                self.config.margin_top,
                width,
                None,
            )
            .ok_or_else(|| LayoutError::LayoutFailed("document root is not an element".into()))?;

        tracing::debug!(
            "Layout produced {} boxes, content height {:.1}",
            root_box.descendants().count() + 1,
            root_box.rect.height
        );
        Ok(root_box)
    }

    /// Lay out one block-level element whose margin box starts at `(x, y)`.
    ///
    /// `fixed_width` forces the border-box width (table cells); otherwise the
    /// box fills `available` minus its margins unless it declares a width.
    pub(crate) fn layout_block(
        &self,
        tree: &StyledTree,
        id: NodeId,
        parent_style: &ComputedStyle,
        x: f32,
        y: f32,
        available: f32,
        fixed_width: Option<f32>,
    ) -> Option<LayoutBox> {
        let element = tree.element(id)?;
        let style = Arc::new(element.style.inherit_from(parent_style));
        let is_cell = element.is("td") || element.is("th");

        let mut block = LayoutBox::block(Arc::clone(&style)).with_source(SourceNode::new(id, element));
        if !is_cell {
            block.margin = resolve_edges(&style, "margin", available);
        }
        block.border = resolve_border(&style, available);
        block.padding = resolve_edges(&style, "padding", available);
        let frame = block.border.plus(&block.padding);

        let width = match fixed_width {
            Some(width) => width,
            None => match declared_size(&style, "width", available) {
                Some(width) => width + frame.horizontal(),
                None => (available - block.margin.horizontal()).max(0.0),
            },
        };
        block.rect = Rect::new(x + block.margin.left, y + block.margin.top, width, 0.0);

        let content = block.content_rect();
        let (children, content_height) = if element.is("tr") {
            self.layout_row(tree, id, &style, content)
        } else {
            self.layout_children(tree, id, &style, content)
        };

        let content_height = declared_size(&style, "height", 0.0).unwrap_or(content_height);
        block.rect.height = content_height + frame.vertical();
        if let Some(slot) = block.children_mut() {
            *slot = children;
        }

        tracing::trace!(
            "Block <{}> at ({:.1}, {:.1}) size {:.1}x{:.1}",
            element.tag,
            block.rect.x,
            block.rect.y,
            block.rect.width,
            block.rect.height
        );
        Some(block)
    }

    /// Lay out the children of a block inside its content box and return
    /// them with the content height they use.
    fn layout_children(
        &self,
        tree: &StyledTree,
        id: NodeId,
        style: &Arc<ComputedStyle>,
        content: Rect,
    ) -> (Vec<LayoutBox>, f32) {
        let children: Vec<(NodeId, DisplayLevel)> = tree
            .children(id)
            .iter()
            .filter_map(|&child| node_level(tree, child).map(|level| (child, level)))
            .collect();

        if children.iter().all(|(_, level)| *level == DisplayLevel::Inline) {
            let nodes: Vec<NodeId> = children.iter().map(|(child, _)| *child).collect();
            let inline = InlineFormatter::new(self.measurer).layout(tree, &nodes, style, content);
            return (inline.boxes, inline.height);
        }

        let mut boxes = Vec::new();
        let mut cursor = content.y;
        let mut pending: Vec<NodeId> = Vec::new();
        for (child, level) in children {
            match level {
                DisplayLevel::Inline => pending.push(child),
                DisplayLevel::Block => {
                    self.flush_anonymous(tree, &mut pending, style, content, &mut cursor, &mut boxes);
                    if let Some(child_box) =
                        self.layout_block(tree, child, style, content.x, cursor, content.width, None)
                    {
                        cursor = child_box.bottom_edge();
                        boxes.push(child_box);
                    }
                }
                DisplayLevel::Replaced => {
                    self.flush_anonymous(tree, &mut pending, style, content, &mut cursor, &mut boxes);
                    if let Some(image) = self.layout_image(tree, child, style, content.x, cursor, content.width) {
                        cursor = image.bottom_edge();
                        boxes.push(image);
                    }
                }
            }
        }
        self.flush_anonymous(tree, &mut pending, style, content, &mut cursor, &mut boxes);

        (boxes, (cursor - content.y).max(0.0))
    }

    /// Wrap a run of inline siblings in an anonymous block
    fn flush_anonymous(
        &self,
        tree: &StyledTree,
        pending: &mut Vec<NodeId>,
        style: &Arc<ComputedStyle>,
        content: Rect,
        cursor: &mut f32,
        boxes: &mut Vec<LayoutBox>,
    ) {
        if pending.is_empty() {
            return;
        }
        let anonymous_style = Arc::new(ComputedStyle::new().inherit_from(style));
        let area = Rect::new(content.x, *cursor, content.width, 0.0);
        let inline = InlineFormatter::new(self.measurer).layout(tree, pending, &anonymous_style, area);
        pending.clear();
        if inline.boxes.is_empty() {
            return;
        }

        let mut anonymous = LayoutBox::block(anonymous_style)
            .with_rect(Rect::new(content.x, *cursor, content.width, inline.height));
        if let Some(slot) = anonymous.children_mut() {
            *slot = inline.boxes;
        }
        *cursor = anonymous.bottom_edge();
        boxes.push(anonymous);
    }

    /// Image boxes take declared dimensions (style, then attributes) or the
    /// 40x40 default.
    fn layout_image(
        &self,
        tree: &StyledTree,
        id: NodeId,
        parent_style: &ComputedStyle,
        x: f32,
        y: f32,
        available: f32,
    ) -> Option<LayoutBox> {
        let element = tree.element(id)?;
        let style = Arc::new(element.style.inherit_from(parent_style));
        let src = element.attribute("src").unwrap_or_default();

        let mut image = LayoutBox::image(src, Arc::clone(&style)).with_source(SourceNode::new(id, element));
        image.margin = resolve_edges(&style, "margin", available);
        image.border = resolve_border(&style, available);
        image.padding = resolve_edges(&style, "padding", available);
        let frame = image.border.plus(&image.padding);

        let dimension = |name: &str, basis: f32| {
            declared_size(&style, name, basis)
                .or_else(|| {
                    element
                        .attribute(name)
                        .map(|v| parse_length(v, basis, -1.0))
                        .filter(|v| *v >= 0.0)
                })
                .unwrap_or(DEFAULT_IMAGE_SIZE)
        };
        let width = dimension("width", available) + frame.horizontal();
        let height = dimension("height", 0.0) + frame.vertical();
        image.rect = Rect::new(x + image.margin.left, y + image.margin.top, width, height);

        tracing::trace!("Image {:?} at ({:.1}, {:.1})", src, image.rect.x, image.rect.y);
        Some(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxKind;
    use text_engine::FixedAdvanceMeasurer;

    const MEASURER: FixedAdvanceMeasurer = FixedAdvanceMeasurer { advance_em: 0.5 };

    fn config() -> LayoutConfig {
        LayoutConfig::default()
            .with_page_width(600.0)
            .with_margins(50.0, 50.0, 50.0)
    }

    fn layout(tree: &StyledTree) -> LayoutBox {
        LayoutEngine::new(&MEASURER, config()).layout(tree).unwrap()
    }

    #[test]
    fn test_display_level_classification() {
        let div = ElementData::new("div");
        assert_eq!(display_level(&div), Some(DisplayLevel::Block));
        let span = ElementData::new("span");
        assert_eq!(display_level(&span), Some(DisplayLevel::Inline));
        let custom = ElementData::new("x-widget");
        assert_eq!(display_level(&custom), Some(DisplayLevel::Inline));
        let flex_span = ElementData::new("span").with_style(ComputedStyle::new().with("display", "flex"));
        assert_eq!(display_level(&flex_span), Some(DisplayLevel::Block));
        let inline_div = ElementData::new("div").with_style(ComputedStyle::new().with("display", "inline-block"));
        assert_eq!(display_level(&inline_div), Some(DisplayLevel::Inline));
        let hidden = ElementData::new("p").with_style(ComputedStyle::new().with("display", "none"));
        assert_eq!(display_level(&hidden), None);
        assert_eq!(display_level(&ElementData::new("script")), None);
        assert_eq!(display_level(&ElementData::new("IMG")), Some(DisplayLevel::Replaced));
    }

    #[test]
    fn test_blocks_stack_without_margin_collapsing() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        tree.append_element(Some(body), "div", "height: 30px; margin: 10px").unwrap();
        tree.append_element(Some(body), "div", "height: 20px; margin-top: 5px").unwrap();

        let root = layout(&tree);
        assert_eq!(root.rect, Rect::new(50.0, 50.0, 500.0, 75.0));
        let first = &root.children()[0];
        let second = &root.children()[1];
        assert_eq!(first.rect, Rect::new(60.0, 60.0, 480.0, 30.0));
        // previous bottom edge 100 + own top margin 5
        assert_eq!(second.rect.y, 105.0);
        assert_eq!(second.rect.width, 500.0);
    }

    #[test]
    fn test_explicit_width_is_content_box() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        tree.append_element(Some(body), "div", "width: 50%; padding: 5px; border: 1px solid")
            .unwrap();

        let root = layout(&tree);
        let div = &root.children()[0];
        assert_eq!(div.rect.width, 262.0);
        assert_eq!(div.rect.height, 12.0);
        assert_eq!(div.content_rect().x, 56.0);
    }

    #[test]
    fn test_html_wrapper_uses_body() {
        let mut tree = StyledTree::new();
        let html = tree.append_element(None, "html", "font-size: 20px; margin: 99px").unwrap();
        let head = tree.append_element(Some(html), "head", "").unwrap();
        tree.append_element(Some(head), "title", "").unwrap();
        let body = tree.append_element(Some(html), "body", "").unwrap();
        let p = tree.append_element(Some(body), "p", "").unwrap();
        tree.insert_text("Hi", p).unwrap();

        let root = layout(&tree);
        assert_eq!(root.node_id(), Some(body));
        assert_eq!(root.style.get("font-size"), Some("20px"));
        assert_eq!(root.style.get("margin"), None);
        assert_eq!(root.rect.x, 50.0);
    }

    #[test]
    fn test_mixed_content_gets_anonymous_blocks() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        tree.insert_text("Intro text", body).unwrap();
        tree.append_element(Some(body), "div", "height: 10px").unwrap();
        tree.insert_text("   \n  ", body).unwrap();

        let root = layout(&tree);
        assert_eq!(root.children().len(), 2);
        let anonymous = &root.children()[0];
        assert!(anonymous.source.is_none());
        assert!(anonymous.is_block());
        assert_eq!(anonymous.children().len(), 3);
        assert!((root.children()[1].rect.y - (50.0 + 19.2)).abs() < 1e-3);
    }

    #[test]
    fn test_image_is_stacked_like_a_block() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let p = tree.append_element(Some(body), "p", "").unwrap();
        tree.insert_text("before", p).unwrap();
        let img = tree.append_element(Some(p), "img", "margin-top: 4px").unwrap();
        tree.set_attribute(img, "src", "logo.png").unwrap();
        tree.set_attribute(img, "height", "25").unwrap();

        let root = layout(&tree);
        let para = &root.children()[0];
        let image = &para.children()[1];
        match &image.kind {
            BoxKind::Image { src } => assert_eq!(src, "logo.png"),
            other => panic!("expected image, got {other:?}"),
        }
        assert_eq!(image.rect.width, 40.0);
        assert_eq!(image.rect.height, 25.0);
        assert!((image.rect.y - (50.0 + 19.2 + 4.0)).abs() < 1e-3);
    }

    #[test]
    fn test_empty_block_has_zero_content_height() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        tree.append_element(Some(body), "div", "padding: 3px").unwrap();
        let root = layout(&tree);
        assert_eq!(root.children()[0].rect.height, 6.0);
    }

    #[test]
    fn test_missing_root_fails() {
        let tree = StyledTree::new();
        let err = LayoutEngine::new(&MEASURER, config()).layout(&tree).unwrap_err();
        assert!(matches!(err, LayoutError::LayoutFailed(_)));
    }

    #[test]
    fn test_non_positive_content_width_rejected() {
        let mut tree = StyledTree::new();
        tree.append_element(None, "body", "").unwrap();
        let config = config().with_margins(10.0, 300.0, 300.0);
        let err = LayoutEngine::new(&MEASURER, config).layout(&tree).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidPageSetup(_)));
    }
}
