//! Table row formatting
//!
//! A `<tr>` places its `<td>`/`<th>` cells side by side. Column widths come
//! from the first header row of the table when there is one, so every body
//! row lines up with the header.

use crate::{display_level, parse_length, LayoutBox, LayoutEngine, Rect};
use doc_model::{ComputedStyle, ElementData, NodeId, StyledTree};
use std::sync::Arc;

/// Rows are never shorter than this
pub const MIN_ROW_HEIGHT: f32 = 20.0;

const CELL_TAGS: &[&str] = &["td", "th"];

/// A cell as seen by column sizing
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnSpec {
    width: Option<f32>,
    span: usize,
}

fn colspan(element: &ElementData) -> usize {
    element
        .attribute("colspan")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|span| *span > 1)
        .unwrap_or(1)
}

/// Declared width of a cell: style `width`, then the `width` attribute
fn declared_cell_width(element: &ElementData, row_width: f32) -> Option<f32> {
    let positive = |v: &str| Some(parse_length(v, row_width, 0.0)).filter(|w| *w > 0.0);
    element
        .style
        .get_trimmed("width")
        .and_then(positive)
        .or_else(|| element.attribute("width").and_then(positive))
}

fn cells(tree: &StyledTree, row: NodeId) -> Vec<NodeId> {
    tree.child_elements(row, CELL_TAGS)
        .filter(|&cell| tree.element(cell).and_then(display_level).is_some())
        .collect()
}

fn scan_row(tree: &StyledTree, row: NodeId, row_width: f32) -> Vec<ColumnSpec> {
    cells(tree, row)
        .into_iter()
        .filter_map(|cell| tree.element(cell))
        .map(|element| ColumnSpec {
            width: declared_cell_width(element, row_width),
            span: colspan(element),
        })
        .collect()
}

fn column_count(specs: &[ColumnSpec]) -> usize {
    specs.iter().map(|spec| spec.span).sum()
}

/// Share the row among `columns` columns. Declared widths are split evenly
/// over their span; undeclared columns split what is left.
fn distribute(specs: &[ColumnSpec], columns: usize, row_width: f32, gap: f32) -> Vec<f32> {
    let mut widths: Vec<Option<f32>> = vec![None; columns];
    let mut index = 0;
    for spec in specs {
        for _ in 0..spec.span {
            if index >= columns {
                break;
            }
            widths[index] = spec.width.map(|w| w / spec.span as f32);
            index += 1;
        }
    }

    let declared: f32 = widths.iter().flatten().sum();
    let undeclared = widths.iter().filter(|w| w.is_none()).count();
    let effective = row_width - gap * columns.saturating_sub(1) as f32;
    let share = if undeclared > 0 {
        (effective - declared).max(0.0) / undeclared as f32
    } else {
        0.0
    };
    widths.into_iter().map(|w| w.unwrap_or(share)).collect()
}

/// Horizontal spacing between cells from one style:
/// `border-spacing` (first value), then `gap`, then `column-gap`.
fn gap_from_style(style: &ComputedStyle, row_width: f32) -> Option<f32> {
    if let Some(spacing) = style.get_trimmed("border-spacing") {
        let first = spacing.split_whitespace().next().unwrap_or(spacing);
        return Some(parse_length(first, row_width, 0.0));
    }
    ["gap", "column-gap"]
        .iter()
        .find_map(|name| style.get_trimmed(name))
        .map(|v| parse_length(v, row_width, 0.0))
}

/// Gap between the cells of `row`: the row's own declaration, else the
/// nearest table's. Never negative.
pub fn row_gap(tree: &StyledTree, row: NodeId, row_width: f32) -> f32 {
    let own = tree
        .element(row)
        .and_then(|el| gap_from_style(&el.style, row_width));
    let gap = own.or_else(|| {
        tree.find_ancestor(row, "table")
            .and_then(|table| tree.element(table))
            .and_then(|el| gap_from_style(&el.style, row_width))
    });
    gap.unwrap_or(0.0).max(0.0)
}

/// Column widths for `row`.
///
/// Inside a table the first row of the first `<thead>` decides when it has
/// cells; columns the current row has beyond it are undeclared. Outside a
/// table every cell gets an equal share.
pub fn table_column_widths(tree: &StyledTree, row: NodeId, row_width: f32, gap: f32) -> Vec<f32> {
    let row_specs = scan_row(tree, row, row_width);
    let row_columns = column_count(&row_specs);

    let Some(table) = tree.find_ancestor(row, "table") else {
        return distribute(&[], row_columns, row_width, gap);
    };

    let header_specs = tree
        .first_child_element(table, "thead")
        .and_then(|thead| tree.first_child_element(thead, "tr"))
        .map(|header| scan_row(tree, header, row_width))
        .filter(|specs| !specs.is_empty());
    let specs = header_specs.unwrap_or(row_specs);
    let columns = column_count(&specs).max(row_columns);
    distribute(&specs, columns, row_width, gap)
}

impl LayoutEngine<'_> {
    /// Lay out the cells of a row inside the row's content box and return
    /// them with the row's content height.
    pub(crate) fn layout_row(
        &self,
        tree: &StyledTree,
        row: NodeId,
        style: &Arc<ComputedStyle>,
        content: Rect,
    ) -> (Vec<LayoutBox>, f32) {
        let cells = cells(tree, row);
        let skipped = tree.children(row).len() - cells.len();
        if skipped > 0 {
            tracing::debug!("Row {} ignores {} non-cell children", row, skipped);
        }

        let gap = row_gap(tree, row, content.width);
        let widths = table_column_widths(tree, row, content.width, gap);
        if widths.is_empty() {
            return (Vec::new(), MIN_ROW_HEIGHT);
        }
        let offsets: Vec<f32> = widths
            .iter()
            .scan(content.x, |x, width| {
                let start = *x;
                *x += width + gap;
                Some(start)
            })
            .collect();

        let mut boxes = Vec::with_capacity(cells.len());
        let mut column = 0;
        for cell in cells {
            let span = tree.element(cell).map_or(1, colspan);
            let first = column.min(widths.len() - 1);
            let last = (first + span).min(widths.len());
            let width = widths[first..last].iter().sum::<f32>() + gap * (last - first - 1) as f32;
            column = first + span;

            let Some(mut cell_box) =
                self.layout_block(tree, cell, style, content.x, content.y, width, Some(width))
            else {
                continue;
            };
            cell_box.translate(offsets[first] - content.x, 0.0);
            boxes.push(cell_box);
        }

        let height = boxes
            .iter()
            .map(|cell| cell.bottom_edge() - content.y)
            .fold(MIN_ROW_HEIGHT, f32::max);
        for cell in &mut boxes {
            cell.rect.height = height - (cell.rect.y - content.y);
        }

        tracing::trace!(
            "Row {} with {} columns, gap {:.1}, height {:.1}",
            row,
            widths.len(),
            gap,
            height
        );
        (boxes, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LayoutConfig, Result};
    use text_engine::FixedAdvanceMeasurer;

    const MEASURER: FixedAdvanceMeasurer = FixedAdvanceMeasurer { advance_em: 0.5 };

    /// Page 500 wide with 50 margins: a 400 wide content root
    fn layout(tree: &StyledTree) -> Result<LayoutBox> {
        let config = LayoutConfig::default()
            .with_page_width(500.0)
            .with_margins(50.0, 50.0, 50.0);
        LayoutEngine::new(&MEASURER, config).layout(tree)
    }

    fn rows(root: &LayoutBox) -> Vec<&LayoutBox> {
        root.descendants().filter(|b| b.is_tag("tr")).collect()
    }

    fn cell_widths(row: &LayoutBox) -> Vec<f32> {
        row.children().iter().map(|cell| cell.rect.width).collect()
    }

    #[test]
    fn test_header_widths_win() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let table = tree.append_element(Some(body), "table", "").unwrap();
        let thead = tree.append_element(Some(table), "thead", "").unwrap();
        let head_row = tree.append_element(Some(thead), "tr", "").unwrap();
        tree.append_element(Some(head_row), "th", "width: 60%").unwrap();
        tree.append_element(Some(head_row), "th", "width: 40%").unwrap();
        let tbody = tree.append_element(Some(table), "tbody", "").unwrap();
        for _ in 0..3 {
            let row = tree.append_element(Some(tbody), "tr", "").unwrap();
            tree.append_element(Some(row), "td", "width: 10%").unwrap();
            tree.append_element(Some(row), "td", "width: 90%").unwrap();
        }

        let root = layout(&tree).unwrap();
        let rows = rows(&root);
        assert_eq!(rows.len(), 4);
        for row in rows {
            assert_eq!(cell_widths(row), vec![240.0, 160.0]);
            assert_eq!(row.children()[1].rect.x, 290.0);
        }
    }

    #[test]
    fn test_colspan_and_undeclared_columns() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let table = tree.append_element(Some(body), "table", "border-spacing: 10px 4px").unwrap();
        let row = tree.append_element(Some(table), "tr", "").unwrap();
        let wide = tree.append_element(Some(row), "td", "width: 200px").unwrap();
        tree.set_attribute(wide, "colspan", "2").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();

        // 4 columns, 3 gaps of 10, 100 + 100 declared, 170 left for two
        let widths = table_column_widths(&tree, row, 400.0, 10.0);
        assert_eq!(widths, vec![100.0, 100.0, 85.0, 85.0]);
        assert_eq!(row_gap(&tree, row, 400.0), 10.0);

        let root = layout(&tree).unwrap();
        let row_box = rows(&root)[0];
        assert_eq!(cell_widths(row_box), vec![210.0, 85.0, 85.0]);
        let xs: Vec<f32> = row_box.children().iter().map(|c| c.rect.x).collect();
        assert_eq!(xs, vec![50.0, 270.0, 365.0]);
    }

    #[test]
    fn test_gap_sources() {
        let mut tree = StyledTree::new();
        let table = tree.append_element(None, "table", "gap: 6px; column-gap: 9px").unwrap();
        let row = tree.append_element(Some(table), "tr", "").unwrap();
        assert_eq!(row_gap(&tree, row, 100.0), 6.0);

        let own = tree.append_element(Some(table), "tr", "column-gap: 3px").unwrap();
        assert_eq!(row_gap(&tree, own, 100.0), 3.0);

        let negative = tree.append_element(Some(table), "tr", "gap: -5px").unwrap();
        assert_eq!(row_gap(&tree, negative, 100.0), 0.0);
    }

    #[test]
    fn test_width_attribute_and_row_outside_table() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let row = tree.append_element(Some(body), "tr", "").unwrap();
        let first = tree.append_element(Some(row), "td", "").unwrap();
        tree.set_attribute(first, "width", "300").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();

        // no table: declarations are ignored and cells share equally
        assert_eq!(table_column_widths(&tree, row, 400.0, 0.0), vec![200.0, 200.0]);

        let mut tree = StyledTree::new();
        let table = tree.append_element(None, "table", "").unwrap();
        let row = tree.append_element(Some(table), "tr", "").unwrap();
        let first = tree.append_element(Some(row), "td", "").unwrap();
        tree.set_attribute(first, "width", "25%").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();
        assert_eq!(table_column_widths(&tree, row, 400.0, 0.0), vec![100.0, 300.0]);
    }

    #[test]
    fn test_row_height_floor_and_stretch() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let table = tree.append_element(Some(body), "table", "").unwrap();
        let row = tree.append_element(Some(table), "tr", "").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();

        let root = layout(&tree).unwrap();
        let row_box = rows(&root)[0];
        assert_eq!(row_box.rect.height, MIN_ROW_HEIGHT);
        assert!(row_box.children().iter().all(|c| c.rect.height == MIN_ROW_HEIGHT));

        let tall = tree.append_element(Some(row), "td", "height: 50px").unwrap();
        let root = layout(&tree).unwrap();
        let row_box = rows(&root)[0];
        assert_eq!(row_box.rect.height, 50.0);
        assert!(row_box.children().iter().all(|c| c.rect.height == 50.0));
        assert_eq!(row_box.children()[2].node_id(), Some(tall));
    }

    #[test]
    fn test_cell_content_moves_with_cell() {
        let mut tree = StyledTree::new();
        let body = tree.append_element(None, "body", "").unwrap();
        let table = tree.append_element(Some(body), "table", "").unwrap();
        let row = tree.append_element(Some(table), "tr", "").unwrap();
        tree.append_element(Some(row), "td", "").unwrap();
        let second = tree.append_element(Some(row), "td", "padding: 2px").unwrap();
        tree.insert_text("Hello", second).unwrap();

        let root = layout(&tree).unwrap();
        let row_box = rows(&root)[0];
        let cell = &row_box.children()[1];
        let word = &cell.children()[0];
        assert_eq!(word.text_content(), Some("Hello"));
        assert_eq!(cell.rect.x, 250.0);
        assert_eq!(word.rect.x, 252.0);
    }
}
