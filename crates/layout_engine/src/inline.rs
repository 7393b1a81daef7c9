//! Inline formatting and line breaking
//!
//! Inline content is flattened into text runs, split into word and space
//! tokens and greedily packed into lines. Every token becomes one inline text
//! leaf positioned on its line's baseline.

use crate::{display_level, font_spec, line_height, DisplayLevel, LayoutBox, Rect};
use doc_model::{ComputedStyle, NodeId, NodeKind, StyledTree};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use text_engine::{FontSpec, TextMeasurer};

/// Slack allowed when comparing a line's width against the available width
const LINE_EPSILON: f32 = 0.01;

/// A space before a word starting with one of these is dropped
const CLOSING_PUNCTUATION: &[char] = &[',', '.', ';', ':', '!', '?', ')', ']', '}', '»'];

/// Horizontal alignment of lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// `right`/`end` and `center`; everything else aligns left
    pub fn from_css(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("right") | Some("end") => Self::Right,
            Some("center") => Self::Center,
            _ => Self::Left,
        }
    }

    /// Offset of a line given the width left over on it
    pub fn offset(&self, remaining: f32) -> f32 {
        let remaining = remaining.max(0.0);
        match self {
            Self::Left => 0.0,
            Self::Center => remaining / 2.0,
            Self::Right => remaining,
        }
    }
}

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: Arc<ComputedStyle>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: Arc<ComputedStyle>) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Geometry of one laid out line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMetrics {
    pub top: f32,
    pub baseline: f32,
    pub height: f32,
    /// Width of the tokens on the line
    pub width: f32,
}

/// Result of formatting inline content
#[derive(Debug, Clone, Default)]
pub struct InlineLayout {
    pub boxes: Vec<LayoutBox>,
    pub lines: Vec<LineMetrics>,
    /// Last line's bottom minus the content top
    pub height: f32,
}

#[derive(Debug)]
struct Token {
    text: String,
    style: Arc<ComputedStyle>,
    font: FontSpec,
    line_height: f32,
    width: f32,
    is_space: bool,
}

#[derive(Debug, Clone, Copy)]
struct Placed {
    index: usize,
    width: f32,
}

/// Collect the text runs under `nodes`, in document order.
///
/// Descent stops at block-level and replaced descendants; those are not part
/// of the text flow. Each run carries the style of its nearest element.
pub fn collect_runs(tree: &StyledTree, nodes: &[NodeId], container_style: &Arc<ComputedStyle>) -> Vec<TextRun> {
    let mut runs = Vec::new();
    for &id in nodes {
        collect_node(tree, id, container_style, &mut runs);
    }
    normalize_runs(runs)
}

fn collect_node(tree: &StyledTree, id: NodeId, inherited: &Arc<ComputedStyle>, runs: &mut Vec<TextRun>) {
    let Some(node) = tree.get(id) else {
        return;
    };
    match &node.kind {
        NodeKind::Text(text) => runs.push(TextRun::new(text.clone(), Arc::clone(inherited))),
        NodeKind::Element(element) => match display_level(element) {
            Some(DisplayLevel::Inline) => {
                let style = Arc::new(element.style.inherit_from(inherited));
                for &child in node.children() {
                    collect_node(tree, child, &style, runs);
                }
            }
            Some(level) => {
                tracing::debug!("Skipping {:?} <{}> nested in inline content", level, element.tag);
            }
            None => {}
        },
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

/// Collapse whitespace, trim the outer ends, drop empty runs and separate
/// runs that would otherwise touch with a single space.
pub fn normalize_runs(runs: Vec<TextRun>) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = runs
        .into_iter()
        .map(|run| TextRun::new(collapse_whitespace(&run.text), run.style))
        .collect();
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    if let Some(last) = runs.last_mut() {
        last.text = last.text.trim_end().to_string();
    }
    runs.retain(|run| !run.text.is_empty());

    let mut out: Vec<TextRun> = Vec::with_capacity(runs.len() * 2);
    for run in runs {
        if let Some(prev) = out.last() {
            if !prev.text.ends_with(' ') && !run.text.starts_with(' ') {
                let style = Arc::clone(&prev.style);
                out.push(TextRun::new(" ", style));
            }
        }
        out.push(run);
    }
    out
}

fn starts_with_closing_punctuation(word: &str) -> bool {
    word.chars().next().is_some_and(|c| CLOSING_PUNCTUATION.contains(&c))
}

/// Greedy line breaker over an injected measurer
pub struct InlineFormatter<'a> {
    measurer: &'a dyn TextMeasurer,
}

impl<'a> InlineFormatter<'a> {
    pub fn new(measurer: &'a dyn TextMeasurer) -> Self {
        Self { measurer }
    }

    /// Format the inline content of `nodes` inside `content`.
    ///
    /// Only `content.x`, `content.y` and `content.width` are used; the
    /// resulting height is reported in the layout.
    pub fn layout(
        &self,
        tree: &StyledTree,
        nodes: &[NodeId],
        container_style: &Arc<ComputedStyle>,
        content: Rect,
    ) -> InlineLayout {
        let runs = collect_runs(tree, nodes, container_style);
        let align = TextAlign::from_css(container_style.get_trimmed("text-align"));
        self.layout_runs(&runs, align, content)
    }

    /// Break already collected runs into positioned lines
    pub fn layout_runs(&self, runs: &[TextRun], align: TextAlign, content: Rect) -> InlineLayout {
        let tokens = self.tokenize(runs);
        let lines = self.break_lines(&tokens, content.width);

        let mut layout = InlineLayout::default();
        let mut top = content.y;
        for line in lines {
            let max_font = line
                .iter()
                .map(|p| tokens[p.index].font.size)
                .fold(0.0, f32::max);
            let leading = line
                .iter()
                .map(|p| tokens[p.index].line_height - tokens[p.index].font.size)
                .fold(f32::NEG_INFINITY, f32::max);
            let height = max_font + leading;
            let baseline = top + max_font;
            let width: f32 = line.iter().map(|p| p.width).sum();

            let mut x = content.x + align.offset(content.width - width);
            for placed in &line {
                let token = &tokens[placed.index];
                let rect = Rect::new(x, baseline - token.font.size, placed.width, token.line_height);
                layout
                    .boxes
                    .push(LayoutBox::text(token.text.clone(), Arc::clone(&token.style)).with_rect(rect));
                x += placed.width;
            }

            layout.lines.push(LineMetrics {
                top,
                baseline,
                height,
                width,
            });
            top += height;
        }
        layout.height = top - content.y;
        layout
    }

    fn tokenize(&self, runs: &[TextRun]) -> Vec<Token> {
        let mut tokens = Vec::new();
        for run in runs {
            let font = font_spec(&run.style);
            let line_height = line_height(&run.style, font.size);
            let mut push = |text: &str, is_space: bool| {
                tokens.push(Token {
                    text: text.to_string(),
                    style: Arc::clone(&run.style),
                    font,
                    line_height,
                    width: self.measurer.measure(text, &font),
                    is_space,
                });
            };

            let mut start = 0;
            let mut current: Option<bool> = None;
            for (i, ch) in run.text.char_indices() {
                let is_space = ch == ' ';
                if current.is_some_and(|prev| prev != is_space) {
                    push(&run.text[start..i], !is_space);
                    start = i;
                }
                current = Some(is_space);
            }
            if let Some(is_space) = current {
                push(&run.text[start..], is_space);
            }
        }
        tokens
    }

    /// Pack tokens into lines. A pending space is only committed together
    /// with the word after it, measured in that word's font.
    fn break_lines(&self, tokens: &[Token], available: f32) -> Vec<Vec<Placed>> {
        let mut lines = Vec::new();
        let mut line: Vec<Placed> = Vec::new();
        let mut line_width = 0.0;
        let mut pending: Option<usize> = None;

        for (index, token) in tokens.iter().enumerate() {
            if token.is_space {
                if !line.is_empty() && pending.is_none() {
                    pending = Some(index);
                }
                continue;
            }

            let space = pending
                .take()
                .filter(|_| !starts_with_closing_punctuation(&token.text))
                .map(|space| Placed {
                    index: space,
                    width: self.measurer.space_width(&token.font),
                });
            let space_width = space.map_or(0.0, |s| s.width);
            let word = Placed {
                index,
                width: token.width,
            };

            if line.is_empty() {
                line.push(word);
                line_width = word.width;
            } else if line_width + space_width + word.width <= available + LINE_EPSILON {
                line.extend(space);
                line.push(word);
                line_width += space_width + word.width;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push(word);
                line_width = word.width;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use text_engine::FixedAdvanceMeasurer;

    // 0.5em per character at 16px: every character is 8 units wide
    const MEASURER: FixedAdvanceMeasurer = FixedAdvanceMeasurer { advance_em: 0.5 };

    fn plain() -> Arc<ComputedStyle> {
        Arc::new(ComputedStyle::new())
    }

    fn texts(layout: &InlineLayout) -> Vec<&str> {
        layout.boxes.iter().filter_map(LayoutBox::text_content).collect()
    }

    #[test]
    fn test_single_line() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = vec![TextRun::new("The quick brown fox", plain())];
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(10.0, 100.0, 500.0, 0.0));

        assert_eq!(texts(&layout), vec!["The", " ", "quick", " ", "brown", " ", "fox"]);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].baseline, 116.0);
        assert_eq!(layout.lines[0].width, 152.0);
        assert!((layout.height - 19.2).abs() < 1e-4);
        assert!(layout.boxes.iter().all(|b| b.rect.y == 100.0));
        assert_eq!(layout.boxes[2].rect.x, 10.0 + 24.0 + 8.0);
    }

    #[test]
    fn test_wraps_and_drops_trailing_space() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = vec![TextRun::new("The quick brown fox", plain())];
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(0.0, 0.0, 72.0, 0.0));

        assert_eq!(layout.lines.len(), 2);
        assert_eq!(layout.lines[0].width, 72.0);
        assert_eq!(texts(&layout), vec!["The", " ", "quick", "brown", " ", "fox"]);
        assert!((layout.lines[1].baseline - layout.lines[0].baseline - 19.2).abs() < 1e-4);
        // second line starts flush left
        assert_eq!(layout.boxes[3].rect.x, 0.0);
    }

    #[test]
    fn test_over_wide_word_gets_own_line() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = vec![TextRun::new("a incomprehensibilities b", plain())];
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(0.0, 0.0, 40.0, 0.0));

        assert_eq!(layout.lines.len(), 3);
        assert_eq!(texts(&layout), vec!["a", "incomprehensibilities", "b"]);
        assert!(layout.lines[1].width > 40.0);
    }

    #[test]
    fn test_space_before_closing_punctuation_dropped() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = vec![TextRun::new("Hello , world", plain())];
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(0.0, 0.0, 500.0, 0.0));
        assert_eq!(texts(&layout), vec!["Hello", ",", " ", "world"]);
    }

    #[test]
    fn test_alignment_offsets() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = vec![TextRun::new("abcd", plain())];
        let area = Rect::new(0.0, 0.0, 100.0, 0.0);

        let right = formatter.layout_runs(&runs, TextAlign::Right, area);
        assert_eq!(right.boxes[0].rect.x, 68.0);
        let center = formatter.layout_runs(&runs, TextAlign::Center, area);
        assert_eq!(center.boxes[0].rect.x, 34.0);

        assert_eq!(TextAlign::from_css(Some("END")), TextAlign::Right);
        assert_eq!(TextAlign::from_css(Some("justify")), TextAlign::Left);
        assert_eq!(TextAlign::from_css(None), TextAlign::Left);
    }

    #[test]
    fn test_mixed_font_sizes_share_baseline() {
        let formatter = InlineFormatter::new(&MEASURER);
        let big = Arc::new(ComputedStyle::new().with("font-size", "32px"));
        let runs = vec![TextRun::new("small ", plain()), TextRun::new("BIG", big)];
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(0.0, 0.0, 500.0, 0.0));

        let line = layout.lines[0];
        assert_eq!(line.baseline, 32.0);
        // 32 + max(19.2 - 16, 38.4 - 32)
        assert!((line.height - 38.4).abs() < 1e-4);
        assert_eq!(layout.boxes[0].rect.y, 16.0);
        assert_eq!(layout.boxes[2].rect.y, 0.0);
    }

    #[test]
    fn test_empty_content_has_zero_height() {
        let formatter = InlineFormatter::new(&MEASURER);
        let runs = normalize_runs(vec![TextRun::new("  \n\t ", plain())]);
        let layout = formatter.layout_runs(&runs, TextAlign::Left, Rect::new(0.0, 0.0, 100.0, 0.0));
        assert!(layout.boxes.is_empty());
        assert_eq!(layout.height, 0.0);
    }

    #[test]
    fn test_normalize_runs() {
        let style = plain();
        let runs = normalize_runs(vec![
            TextRun::new("  Hello\n  there", Arc::clone(&style)),
            TextRun::new("bold", Arc::clone(&style)),
            TextRun::new(" tail  ", Arc::clone(&style)),
        ]);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello there", " ", "bold", " tail"]);
    }

    #[test]
    fn test_collect_runs_stops_at_blocks() {
        let mut tree = StyledTree::new();
        let p = tree.append_element(None, "p", "font-size: 10px").unwrap();
        tree.insert_text("Hello ", p).unwrap();
        let em = tree.append_element(Some(p), "em", "font-style: italic").unwrap();
        tree.insert_text("world", em).unwrap();
        let div = tree.append_element(Some(em), "div", "").unwrap();
        tree.insert_text("hidden", div).unwrap();

        let container = Arc::new(tree.element(p).unwrap().style.clone());
        let runs = collect_runs(&tree, tree.children(p), &container);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello ", "world"]);
        assert_eq!(runs[1].style.get("font-style"), Some("italic"));
        assert_eq!(runs[1].style.get("font-size"), Some("10px"));
    }
}
