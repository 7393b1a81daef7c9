//! Pagination
//!
//! Splits a laid out box tree into fixed-size pages. Pagination is a pure
//! transformation of the finished tree:
//!
//! - Boxes are flattened and sorted into reading order
//! - Headers and footers leave the flow and repeat on every page
//! - Table rows are kept together with their cells
//! - Each box is copied onto exactly one page in page-local coordinates
//! - Anything still crossing the bottom margin is reflowed onto a later page
//!
//! Boxes are never split. A box taller than the usable page height is pinned
//! to the top of its page and allowed to overflow.

use crate::{LayoutBox, LayoutError, Rect, Result};
use serde::{Deserialize, Serialize};

/// Boxes whose tops differ by less than this share a row in reading order
const ROW_TOLERANCE: f32 = 1.0;

/// Slack when checking a box against the bottom of the content area
const OVERFLOW_EPSILON: f32 = 0.01;

/// Content starting within this fraction of the first page stays on it
const FIRST_PAGE_PIN: f32 = 0.2;

/// Upper bound on overflow moves before pagination gives up
pub const DEFAULT_MAX_REFLOW_ITERATIONS: usize = 10_000;

/// Standard page sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    /// A3 (297mm x 420mm)
    A3,
    /// A4 (210mm x 297mm)
    A4,
    /// A5 (148mm x 210mm)
    A5,
    /// US Letter (8.5" x 11")
    Letter,
    /// Legal (8.5" x 14")
    Legal,
    /// Custom size in points
    Custom { width: f32, height: f32 },
}

impl PageSize {
    /// Get the width and height in points
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::A3 => (841.89, 1190.55),
            PageSize::A4 => (595.276, 841.89),
            PageSize::A5 => (419.53, 595.276),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        PageSize::A4
    }
}

/// Which classified boxes repeat on every page.
///
/// A box is a header when its tag is `header` or a class token contains
/// `header`; footers likewise. Disabled kinds flow like normal content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFooterConfig {
    pub repeat_headers: bool,
    pub repeat_footers: bool,
}

impl Default for HeaderFooterConfig {
    fn default() -> Self {
        Self {
            repeat_headers: true,
            repeat_footers: true,
        }
    }
}

impl HeaderFooterConfig {
    /// Treat headers and footers as ordinary content
    pub fn none() -> Self {
        Self {
            repeat_headers: false,
            repeat_footers: false,
        }
    }
}

/// Page layout configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page size
    pub page_size: PageSize,
    /// Page width in points (derived from page_size or custom)
    pub page_width: f32,
    /// Page height in points (derived from page_size or custom)
    pub page_height: f32,
    /// Top margin in points
    pub margin_top: f32,
    /// Bottom margin in points
    pub margin_bottom: f32,
    /// Left margin in points
    pub margin_left: f32,
    /// Right margin in points
    pub margin_right: f32,
    /// Header and footer repetition
    pub header_footer: HeaderFooterConfig,
    /// Overflow moves allowed before failing with `ReflowDiverged`
    pub max_reflow_iterations: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self::a4()
    }
}

impl PageConfig {
    /// Configuration for a standard size with 1 inch margins
    pub fn from_size(page_size: PageSize) -> Self {
        let (width, height) = page_size.dimensions();
        Self {
            page_size,
            page_width: width,
            page_height: height,
            margin_top: 72.0,
            margin_bottom: 72.0,
            margin_left: 72.0,
            margin_right: 72.0,
            header_footer: HeaderFooterConfig::default(),
            max_reflow_iterations: DEFAULT_MAX_REFLOW_ITERATIONS,
        }
    }

    /// Create an A4-sized page configuration
    pub fn a4() -> Self {
        Self::from_size(PageSize::A4)
    }

    /// Create a Letter-sized page configuration
    pub fn letter() -> Self {
        Self::from_size(PageSize::Letter)
    }

    /// Create a custom page configuration
    pub fn custom(width: f32, height: f32) -> Self {
        Self::from_size(PageSize::Custom { width, height })
    }

    pub fn with_margins(mut self, top: f32, right: f32, bottom: f32, left: f32) -> Self {
        self.margin_top = top;
        self.margin_right = right;
        self.margin_bottom = bottom;
        self.margin_left = left;
        self
    }

    pub fn with_header_footer(mut self, header_footer: HeaderFooterConfig) -> Self {
        self.header_footer = header_footer;
        self
    }

    pub fn with_max_reflow_iterations(mut self, iterations: usize) -> Self {
        self.max_reflow_iterations = iterations;
        self
    }

    /// Width between the left and right margins
    pub fn content_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    /// Height between the top and bottom margins
    pub fn content_height(&self) -> f32 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Reject geometry that cannot hold any content
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.page_width,
            self.page_height,
            self.margin_top,
            self.margin_bottom,
            self.margin_left,
            self.margin_right,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(LayoutError::InvalidPageSetup(
                "page size and margins must be finite and non-negative".into(),
            ));
        }
        if self.content_width() <= 0.0 {
            return Err(LayoutError::InvalidPageSetup(format!(
                "margins leave no horizontal room on a {:.1} wide page",
                self.page_width
            )));
        }
        if self.content_height() <= 0.0 {
            return Err(LayoutError::InvalidPageSetup(format!(
                "margins leave no vertical room on a {:.1} high page",
                self.page_height
            )));
        }
        Ok(())
    }
}

/// One output page.
///
/// Boxes are detached copies in page coordinates: repeated headers first,
/// then the page's content in reading order, then repeated footers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub boxes: Vec<LayoutBox>,
    #[serde(default)]
    pub header_count: usize,
    #[serde(default)]
    pub footer_count: usize,
}

impl Page {
    pub fn new(index: usize, width: f32, height: f32) -> Self {
        Self {
            index,
            width,
            height,
            boxes: Vec::new(),
            header_count: 0,
            footer_count: 0,
        }
    }

    /// Counts that do not fit `boxes` (e.g. from hand-edited JSON) yield
    /// empty slices
    pub fn header_boxes(&self) -> &[LayoutBox] {
        self.boxes.get(..self.header_count).unwrap_or(&[])
    }

    pub fn content_boxes(&self) -> &[LayoutBox] {
        self.boxes
            .len()
            .checked_sub(self.footer_count)
            .and_then(|end| self.boxes.get(self.header_count..end))
            .unwrap_or(&[])
    }

    pub fn footer_boxes(&self) -> &[LayoutBox] {
        self.boxes
            .len()
            .checked_sub(self.footer_count)
            .and_then(|start| self.boxes.get(start..))
            .unwrap_or(&[])
    }
}

/// How a group of boxes moves between pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    /// A box with children. Moves like a leaf; its children are units of
    /// their own placed relative to it.
    Frame,
    /// A leaf, or the text leaves of one line
    Flow,
    /// A table row and everything inside it
    Row,
}

#[derive(Debug)]
struct Unit {
    kind: UnitKind,
    /// Nearest enclosing frame unit
    parent: Option<usize>,
    top: f32,
    bottom: f32,
}

impl Unit {
    fn new(kind: UnitKind, parent: Option<usize>) -> Self {
        Self {
            kind,
            parent,
            top: f32::INFINITY,
            bottom: f32::NEG_INFINITY,
        }
    }

    fn include(&mut self, rect: Rect) {
        self.top = self.top.min(rect.y);
        self.bottom = self.bottom.max(rect.bottom());
    }

    fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

struct Entry<'a> {
    layout: &'a LayoutBox,
    unit: usize,
}

/// The box tree below the content root, split into flow and bands
#[derive(Default)]
struct Flattened<'a> {
    entries: Vec<Entry<'a>>,
    units: Vec<Unit>,
    headers: Vec<&'a LayoutBox>,
    footers: Vec<&'a LayoutBox>,
}

impl<'a> Flattened<'a> {
    fn new_unit(&mut self, kind: UnitKind, parent: Option<usize>) -> usize {
        self.units.push(Unit::new(kind, parent));
        self.units.len() - 1
    }

    /// Whether `unit` lies somewhere inside the frame unit `ancestor`
    fn is_inside(&self, unit: usize, ancestor: usize) -> bool {
        let mut current = self.units[unit].parent;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.units[parent].parent;
        }
        false
    }

    fn push(&mut self, layout: &'a LayoutBox, unit: usize) {
        self.units[unit].include(layout.rect);
        self.entries.push(Entry { layout, unit });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Header,
    Footer,
}

/// Vertical extent available to content on every page
#[derive(Debug, Clone, Copy)]
struct ContentArea {
    top: f32,
    bottom: f32,
}

impl ContentArea {
    fn usable(&self) -> f32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone)]
struct Placed {
    layout: LayoutBox,
    unit: usize,
    pinned: bool,
}

/// A page under construction
#[derive(Debug, Clone, Default)]
struct Draft {
    placed: Vec<Placed>,
    /// How far this page's content has been pushed down by units carried
    /// over from the previous page
    shift: f32,
}

impl Draft {
    /// Where the next re-homed unit would start
    fn cursor(&self, area: &ContentArea) -> f32 {
        self.placed
            .iter()
            .map(|p| p.layout.rect.bottom())
            .fold(area.top, f32::max)
    }
}

/// Sort by top, then left to right among boxes whose tops are within
/// [`ROW_TOLERANCE`] of the first box of their row.
fn reading_order<T>(items: &mut [T], rect: impl Fn(&T) -> Rect) {
    items.sort_by(|a, b| rect(a).y.total_cmp(&rect(b).y));
    let mut start = 0;
    while start < items.len() {
        let anchor = rect(&items[start]).y;
        let mut end = start + 1;
        while end < items.len() && rect(&items[end]).y - anchor < ROW_TOLERANCE {
            end += 1;
        }
        items[start..end].sort_by(|a, b| rect(a).x.total_cmp(&rect(b).x));
        start = end;
    }
}

/// Copy band subtrees stacked from `start`, returning the copies and the
/// band height.
fn stack_band(subtrees: &[&LayoutBox], start: f32) -> (Vec<LayoutBox>, f32) {
    let mut boxes = Vec::new();
    let mut cursor = start;
    for root in subtrees {
        let top = root.rect.y - root.margin.top;
        let bottom = root
            .descendants()
            .map(|b| b.rect.bottom())
            .fold(root.bottom_edge(), f32::max);
        let dy = cursor - top;
        for layout in std::iter::once(*root).chain(root.descendants()) {
            let mut copy = layout.detached();
            copy.translate(0.0, dy);
            boxes.push(copy);
        }
        cursor += bottom - top;
    }
    (boxes, cursor - start)
}

/// Paginator that converts a laid out box tree into pages
pub struct Paginator {
    config: PageConfig,
}

impl Paginator {
    /// Create a new paginator with the given configuration
    pub fn new(config: PageConfig) -> Self {
        Self { config }
    }

    /// Create a paginator with A4 page configuration
    pub fn a4() -> Self {
        Self::new(PageConfig::a4())
    }

    /// Create a paginator with Letter page configuration
    pub fn letter() -> Self {
        Self::new(PageConfig::letter())
    }

    /// Get a reference to the page configuration
    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Split the descendants of `root` into pages.
    ///
    /// `root` itself is the content root and is not placed.
    pub fn paginate(&self, root: &LayoutBox) -> Result<Vec<Page>> {
        self.config.validate()?;

        let mut flat = Flattened::default();
        self.flatten_children(root, None, None, &mut flat);

        let (headers, header_band) = stack_band(&flat.headers, self.config.margin_top);
        let (mut footers, footer_band) = stack_band(&flat.footers, 0.0);
        let area = ContentArea {
            top: self.config.margin_top + header_band,
            bottom: self.config.page_height - self.config.margin_bottom - footer_band,
        };
        for footer in &mut footers {
            footer.translate(0.0, area.bottom);
        }
        if area.usable() <= 0.0 {
            tracing::warn!(
                "Headers ({:.1}) and footers ({:.1}) leave no room for content, flowing them as content",
                header_band,
                footer_band
            );
            let flowing = self.config.clone().with_header_footer(HeaderFooterConfig::none());
            return Paginator::new(flowing).paginate(root);
        }

        let mut order: Vec<usize> = (0..flat.entries.len()).collect();
        reading_order(&mut order, |&i| flat.entries[i].layout.rect);

        let start = flat.units.iter().map(|u| u.top).fold(f32::INFINITY, f32::min);
        let end = flat.units.iter().map(|u| u.bottom).fold(f32::NEG_INFINITY, f32::max);
        let estimated = if flat.units.is_empty() {
            1
        } else {
            ((end - start) / area.usable()).ceil().max(1.0) as usize
        };
        tracing::debug!(
            "Paginating {} boxes in {} units, estimated {} pages of {:.1} usable height",
            flat.entries.len(),
            flat.units.len(),
            estimated,
            area.usable()
        );

        let mut drafts = self.materialize(&flat, &order, start, estimated, &area);
        self.reflow(&mut drafts, &area)?;

        let mut pages: Vec<Page> = drafts
            .into_iter()
            .filter(|draft| !draft.placed.is_empty())
            .enumerate()
            .map(|(index, mut draft)| {
                reading_order(&mut draft.placed, |p| p.layout.rect);
                self.assemble(index, draft.placed.into_iter().map(|p| p.layout), &headers, &footers)
            })
            .collect();
        if pages.is_empty() {
            pages.push(self.assemble(0, std::iter::empty(), &headers, &footers));
        }

        tracing::debug!("Paginated into {} pages", pages.len());
        Ok(pages)
    }

    fn assemble(
        &self,
        index: usize,
        content: impl Iterator<Item = LayoutBox>,
        headers: &[LayoutBox],
        footers: &[LayoutBox],
    ) -> Page {
        let mut page = Page::new(index, self.config.page_width, self.config.page_height);
        page.boxes.extend(headers.iter().cloned());
        page.boxes.extend(content);
        page.boxes.extend(footers.iter().cloned());
        page.header_count = headers.len();
        page.footer_count = footers.len();
        page
    }

    fn classify(&self, layout: &LayoutBox) -> Option<Band> {
        let repeat = self.config.header_footer;
        if repeat.repeat_headers && (layout.is_tag("header") || layout.has_class_containing("header")) {
            return Some(Band::Header);
        }
        if repeat.repeat_footers && (layout.is_tag("footer") || layout.has_class_containing("footer")) {
            return Some(Band::Footer);
        }
        None
    }

    /// Pre-order walk assigning every box to a unit. Inside a row nothing is
    /// classified; the whole row moves as one.
    fn flatten_children<'a>(
        &self,
        parent: &'a LayoutBox,
        row: Option<usize>,
        frame: Option<usize>,
        flat: &mut Flattened<'a>,
    ) {
        let mut line: Option<usize> = None;
        for child in parent.children() {
            if let Some(unit) = row {
                flat.push(child, unit);
                self.flatten_children(child, row, frame, flat);
                continue;
            }

            if let Some(band) = self.classify(child) {
                match band {
                    Band::Header => flat.headers.push(child),
                    Band::Footer => flat.footers.push(child),
                }
                line = None;
                continue;
            }

            if child.is_tag("tr") {
                let unit = flat.new_unit(UnitKind::Row, frame);
                flat.push(child, unit);
                self.flatten_children(child, Some(unit), frame, flat);
                line = None;
                continue;
            }

            if child.text_content().is_some() {
                let unit = match line {
                    Some(unit) if child.rect.y < flat.units[unit].bottom - OVERFLOW_EPSILON => unit,
                    _ => flat.new_unit(UnitKind::Flow, frame),
                };
                flat.push(child, unit);
                line = Some(unit);
                continue;
            }

            line = None;
            let kind = if child.children().is_empty() {
                UnitKind::Flow
            } else {
                UnitKind::Frame
            };
            let unit = flat.new_unit(kind, frame);
            flat.push(child, unit);
            let inner = if kind == UnitKind::Frame { Some(unit) } else { frame };
            self.flatten_children(child, None, inner, flat);
        }
    }

    /// Page a unit starts on before any pushing
    fn provisional_page(&self, unit: &Unit, start: f32, usable: f32, estimated: usize, last_row: bool) -> usize {
        let offset = unit.top - start;
        if offset < FIRST_PAGE_PIN * usable {
            return 0;
        }
        let natural = (offset / usable).floor().max(0.0) as usize;
        let last = estimated.saturating_sub(1);
        // The final row joins the last page once any part of it reaches
        // into that page. Pushing would land it there as well; this only
        // saves the detour through the page before.
        if last_row && offset + unit.height() > last as f32 * usable + OVERFLOW_EPSILON {
            return natural.max(last);
        }
        natural
    }

    /// Copy every unit onto a page in reading order
    fn materialize(
        &self,
        flat: &Flattened<'_>,
        order: &[usize],
        start: f32,
        estimated: usize,
        area: &ContentArea,
    ) -> Vec<Draft> {
        let usable = area.usable();

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); flat.units.len()];
        let mut unit_order = Vec::with_capacity(flat.units.len());
        for &i in order {
            let unit = flat.entries[i].unit;
            if members[unit].is_empty() {
                unit_order.push(unit);
            }
            members[unit].push(i);
        }
        let last_row = unit_order
            .iter()
            .rev()
            .copied()
            .find(|&u| flat.units[u].kind == UnitKind::Row);

        let mut drafts: Vec<Draft> = vec![Draft::default(); estimated];
        let mut floor = 0;
        for &unit_id in &unit_order {
            let unit = &flat.units[unit_id];
            let natural = unit.top - start;
            let mut page = self
                .provisional_page(unit, start, usable, estimated, Some(unit_id) == last_row)
                .max(floor);

            let height = unit.height();
            let oversized = height > usable + OVERFLOW_EPSILON;
            let (offset, pinned) = loop {
                ensure_page(&mut drafts, page);
                let mut offset = natural - page as f32 * usable + drafts[page].shift;
                if offset < 0.0 {
                    drafts[page].shift -= offset;
                    offset = 0.0;
                }
                if !oversized {
                    if offset + height <= usable + OVERFLOW_EPSILON {
                        break (offset, false);
                    }
                    page += 1;
                    continue;
                }

                // Anything on the page other than enclosing frames blocks
                // an oversized unit from starting mid-page.
                let blocked = drafts[page].placed.iter().any(|p| !flat.is_inside(unit_id, p.unit));
                if blocked && offset > OVERFLOW_EPSILON {
                    page += 1;
                    continue;
                }
                tracing::warn!(
                    "Box of height {:.1} exceeds usable page height {:.1}, pinned on page {}",
                    height,
                    usable,
                    page
                );
                if blocked || drafts[page].placed.is_empty() {
                    drafts[page].shift -= offset;
                    break (0.0, true);
                }
                // inside a pinned frame: keep its place within the frame
                break (offset, true);
            };
            ensure_page(&mut drafts, page);

            let dy = area.top + offset - unit.top;
            for &i in &members[unit_id] {
                let mut copy = flat.entries[i].layout.detached();
                copy.translate(0.0, dy);
                drafts[page].placed.push(Placed {
                    layout: copy,
                    unit: unit_id,
                    pinned,
                });
            }
            tracing::trace!("Unit {} ({:?}) on page {} at offset {:.1}", unit_id, unit.kind, page, offset);
            floor = page;
        }
        drafts
    }

    /// Move units that still cross the bottom of the content area to the
    /// first later page with room, until nothing overflows.
    fn reflow(&self, drafts: &mut Vec<Draft>, area: &ContentArea) -> Result<()> {
        let mut iterations = 0;
        while let Some((page, unit)) = find_overflow(drafts, area) {
            if iterations >= self.config.max_reflow_iterations {
                return Err(LayoutError::ReflowDiverged { iterations });
            }
            iterations += 1;

            let (moved, kept): (Vec<Placed>, Vec<Placed>) =
                std::mem::take(&mut drafts[page].placed).into_iter().partition(|p| p.unit == unit);
            drafts[page].placed = kept;

            let top = moved.iter().map(|p| p.layout.rect.y).fold(f32::INFINITY, f32::min);
            let bottom = moved.iter().map(|p| p.layout.rect.bottom()).fold(f32::NEG_INFINITY, f32::max);
            let height = bottom - top;

            let target = (page + 1..drafts.len())
                .find(|&q| drafts[q].cursor(area) + height <= area.bottom + OVERFLOW_EPSILON)
                .unwrap_or_else(|| {
                    drafts.push(Draft::default());
                    drafts.len() - 1
                });
            let dy = drafts[target].cursor(area) - top;
            for mut placed in moved {
                placed.layout.translate(0.0, dy);
                drafts[target].placed.push(placed);
            }
            reading_order(&mut drafts[target].placed, |p| p.layout.rect);
            tracing::trace!("Reflowed unit {} from page {} to page {}", unit, page, target);
        }
        if iterations > 0 {
            tracing::debug!("Overflow reflow settled after {} moves", iterations);
        }
        Ok(())
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PageConfig::default())
    }
}

fn ensure_page(drafts: &mut Vec<Draft>, page: usize) {
    if drafts.len() <= page {
        drafts.resize_with(page + 1, Draft::default);
    }
}

/// First unit on any page that crosses the bottom of the content area
fn find_overflow(drafts: &[Draft], area: &ContentArea) -> Option<(usize, usize)> {
    drafts.iter().enumerate().find_map(|(index, draft)| {
        draft
            .placed
            .iter()
            .find(|p| !p.pinned && p.layout.rect.bottom() > area.bottom + OVERFLOW_EPSILON)
            .map(|p| (index, p.unit))
    })
}
