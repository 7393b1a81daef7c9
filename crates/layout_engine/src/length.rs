//! Length values and box-model edges read from resolved styles
//!
//! Parsing never fails: anything unreadable falls back to the default the
//! caller supplies, so a bad declaration degrades one box instead of the
//! whole conversion.

use crate::BoxEdges;
use doc_model::ComputedStyle;
use text_engine::{FontFamily, FontSpec, FontStyle, FontWeight};

/// Units per `em`/`rem`. Relative units do not follow the inherited font size.
pub const EM_SIZE: f32 = 16.0;

/// Font size when nothing is declared
pub const DEFAULT_FONT_SIZE: f32 = 16.0;

/// `line-height: normal` as a multiple of the font size
pub const NORMAL_LINE_HEIGHT: f32 = 1.2;

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Parse a single CSS length.
///
/// Accepts `N`, `Npx`, `Npt`, `N%` (of `container`), `Nem` and `Nrem`.
/// Empty, `auto` and unparseable values yield `default`.
pub fn parse_length(value: &str, container: f32, default: f32) -> f32 {
    let value = value.trim().to_ascii_lowercase();
    if value.is_empty() || value == "auto" {
        return default;
    }

    let (number, scale) = if let Some(n) = value.strip_suffix('%') {
        (n, container / 100.0)
    } else if let Some(n) = value.strip_suffix("rem") {
        (n, EM_SIZE)
    } else if let Some(n) = value.strip_suffix("em") {
        (n, EM_SIZE)
    } else if let Some(n) = value.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("pt") {
        (n, 1.0)
    } else {
        (value.as_str(), 1.0)
    };

    match number.trim().parse::<f32>() {
        Ok(n) if n.is_finite() => n * scale,
        _ => default,
    }
}

/// Expand 1-4 whitespace separated values into top/right/bottom/left.
/// Values past the fourth are ignored.
fn four_sides(value: &str) -> Option<[&str; 4]> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    match parts.as_slice() {
        [] => None,
        &[a] => Some([a, a, a, a]),
        &[v, h] => Some([v, h, v, h]),
        &[t, h, b] => Some([t, h, b, h]),
        &[t, r, b, l, ..] => Some([t, r, b, l]),
    }
}

/// Parse a `margin`/`padding`-style shorthand with CSS 1-4 value syntax
pub fn parse_box_shorthand(value: &str, container: f32, default: f32) -> BoxEdges {
    match four_sides(value) {
        Some([t, r, b, l]) => BoxEdges::new(
            parse_length(t, container, default),
            parse_length(r, container, default),
            parse_length(b, container, default),
            parse_length(l, container, default),
        ),
        None => BoxEdges::uniform(default),
    }
}

/// Resolve `margin` or `padding` edges.
///
/// A non-empty shorthand wins; otherwise each side reads its own longhand
/// (`margin-top`, ...). Percentages resolve against the containing width.
pub fn resolve_edges(style: &ComputedStyle, prefix: &str, container: f32) -> BoxEdges {
    if let Some(shorthand) = style.get_trimmed(prefix) {
        return parse_box_shorthand(shorthand, container, 0.0);
    }
    let side = |name: &str| {
        style
            .get_trimmed(&format!("{prefix}-{name}"))
            .map_or(0.0, |v| parse_length(v, container, 0.0))
    };
    BoxEdges::new(side("top"), side("right"), side("bottom"), side("left"))
}

/// Initial border width when only a line style is given
const MEDIUM_BORDER: f32 = 3.0;

fn border_keyword_width(token: &str) -> Option<f32> {
    match token {
        "thin" => Some(1.0),
        "medium" => Some(MEDIUM_BORDER),
        "thick" => Some(5.0),
        _ => None,
    }
}

fn is_line_style(token: &str) -> bool {
    matches!(
        token,
        "none" | "hidden" | "dotted" | "dashed" | "solid" | "double" | "groove" | "ridge" | "inset" | "outset"
    )
}

fn starts_like_number(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
}

/// Width and line style named by a `border`/`border-<side>` shorthand
fn parse_border_shorthand(value: &str, container: f32) -> (Option<f32>, Option<String>) {
    let mut width = None;
    let mut line = None;
    for token in value.split_whitespace() {
        let token = token.to_ascii_lowercase();
        if width.is_none() {
            if let Some(w) = border_keyword_width(&token) {
                width = Some(w);
                continue;
            }
            if starts_like_number(&token) {
                width = Some(parse_length(&token, container, 0.0));
                continue;
            }
        }
        if line.is_none() && is_line_style(&token) {
            line = Some(token);
        }
    }
    (width, line)
}

fn border_side_style(style: &ComputedStyle, index: usize, container: f32) -> Option<String> {
    let side = SIDES[index];
    if let Some(v) = style.get_trimmed(&format!("border-{side}-style")) {
        return Some(v.to_ascii_lowercase());
    }
    if let Some(sides) = style.get_trimmed("border-style").and_then(four_sides) {
        return Some(sides[index].to_ascii_lowercase());
    }
    for name in [format!("border-{side}"), "border".to_string()] {
        if let Some(v) = style.get_trimmed(&name) {
            if let (_, Some(line)) = parse_border_shorthand(v, container) {
                return Some(line);
            }
        }
    }
    None
}

fn border_side_width(style: &ComputedStyle, index: usize, container: f32) -> f32 {
    let side = SIDES[index];
    if let Some(v) = style.get_trimmed(&format!("border-{side}-width")) {
        let v = v.to_ascii_lowercase();
        return border_keyword_width(&v).unwrap_or_else(|| parse_length(&v, container, 0.0));
    }
    if let Some(sides) = style.get_trimmed("border-width").and_then(four_sides) {
        let v = sides[index].to_ascii_lowercase();
        return border_keyword_width(&v).unwrap_or_else(|| parse_length(&v, container, 0.0));
    }
    for name in [format!("border-{side}"), "border".to_string()] {
        if let Some(v) = style.get_trimmed(&name) {
            match parse_border_shorthand(v, container) {
                (Some(width), _) => return width,
                (None, Some(_)) => return MEDIUM_BORDER,
                (None, None) => {}
            }
        }
    }
    0.0
}

/// Resolve border widths.
///
/// Sources in order: `border-<side>-width`, `border-width`, `border-<side>`,
/// `border`. A side explicitly styled `none` or `hidden` has no width.
pub fn resolve_border(style: &ComputedStyle, container: f32) -> BoxEdges {
    let mut widths = [0.0f32; 4];
    for (index, width) in widths.iter_mut().enumerate() {
        let hidden = border_side_style(style, index, container)
            .is_some_and(|line| line == "none" || line == "hidden");
        *width = if hidden {
            0.0
        } else {
            border_side_width(style, index, container).max(0.0)
        };
    }
    BoxEdges::new(widths[0], widths[1], widths[2], widths[3])
}

/// Declared `font-size`, defaulting to 16
pub fn font_size(style: &ComputedStyle) -> f32 {
    let size = style
        .get_trimmed("font-size")
        .map_or(DEFAULT_FONT_SIZE, |v| parse_length(v, DEFAULT_FONT_SIZE, DEFAULT_FONT_SIZE));
    if size > 0.0 {
        size
    } else {
        DEFAULT_FONT_SIZE
    }
}

/// Used line height for a font size.
///
/// A unitless number multiplies the font size, `normal` is 1.2 times it and
/// percentages resolve against it.
pub fn line_height(style: &ComputedStyle, font_size: f32) -> f32 {
    let normal = NORMAL_LINE_HEIGHT * font_size;
    let Some(value) = style.get_trimmed("line-height") else {
        return normal;
    };
    if value.eq_ignore_ascii_case("normal") {
        return normal;
    }
    if let Ok(factor) = value.parse::<f32>() {
        return if factor.is_finite() && factor >= 0.0 {
            factor * font_size
        } else {
            normal
        };
    }
    let height = parse_length(value, font_size, normal);
    if height >= 0.0 {
        height
    } else {
        normal
    }
}

/// The face and size text in this style is measured with
pub fn font_spec(style: &ComputedStyle) -> FontSpec {
    FontSpec::new(FontFamily::from_css(style.get_trimmed("font-family")), font_size(style))
        .with_weight(FontWeight::from_css(style.get_trimmed("font-weight")))
        .with_style(FontStyle::from_css(style.get_trimmed("font-style")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length_units() {
        assert_eq!(parse_length("12px", 100.0, 0.0), 12.0);
        assert_eq!(parse_length("12", 100.0, 0.0), 12.0);
        assert_eq!(parse_length("9pt", 100.0, 0.0), 9.0);
        assert_eq!(parse_length("25%", 400.0, 0.0), 100.0);
        assert_eq!(parse_length("2em", 100.0, 0.0), 32.0);
        assert_eq!(parse_length("1.5rem", 100.0, 0.0), 24.0);
        assert_eq!(parse_length("0", 100.0, 7.0), 0.0);
        assert_eq!(parse_length("-4px", 100.0, 0.0), -4.0);
    }

    #[test]
    fn test_parse_length_defaults() {
        assert_eq!(parse_length("", 100.0, 7.0), 7.0);
        assert_eq!(parse_length("auto", 100.0, 7.0), 7.0);
        assert_eq!(parse_length("abc", 100.0, 7.0), 7.0);
        assert_eq!(parse_length("px", 100.0, 7.0), 7.0);
        assert_eq!(parse_length("inf", 100.0, 7.0), 7.0);
    }

    #[test]
    fn test_box_shorthand_forms() {
        assert_eq!(parse_box_shorthand("5px", 0.0, 0.0), BoxEdges::uniform(5.0));
        assert_eq!(parse_box_shorthand("1 2", 0.0, 0.0), BoxEdges::new(1.0, 2.0, 1.0, 2.0));
        assert_eq!(parse_box_shorthand("1 2 3", 0.0, 0.0), BoxEdges::new(1.0, 2.0, 3.0, 2.0));
        assert_eq!(parse_box_shorthand("1 2 3 4", 0.0, 0.0), BoxEdges::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(parse_box_shorthand("1 2 3 4 5", 0.0, 0.0), BoxEdges::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(parse_box_shorthand("  ", 0.0, 9.0), BoxEdges::uniform(9.0));
        assert_eq!(parse_box_shorthand("10%", 200.0, 0.0), BoxEdges::uniform(20.0));
    }

    #[test]
    fn test_shorthand_beats_longhands() {
        let style = ComputedStyle::from_declarations("margin: 4px; margin-top: 10px");
        assert_eq!(resolve_edges(&style, "margin", 100.0), BoxEdges::uniform(4.0));

        let style = ComputedStyle::from_declarations("margin: ; padding-left: 10%; padding-top: 3px");
        assert_eq!(resolve_edges(&style, "margin", 100.0), BoxEdges::zero());
        assert_eq!(resolve_edges(&style, "padding", 100.0), BoxEdges::new(3.0, 0.0, 0.0, 10.0));
    }

    #[test]
    fn test_border_widths() {
        let style = ComputedStyle::from_declarations("border: 2px solid black");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::uniform(2.0));

        let style = ComputedStyle::from_declarations("border-width: 1px 3px; border-left-width: thick");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::new(1.0, 3.0, 1.0, 5.0));

        let style = ComputedStyle::from_declarations("border-bottom: 1px dashed red");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::new(0.0, 0.0, 1.0, 0.0));

        let style = ComputedStyle::from_declarations("border: solid");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::uniform(3.0));
    }

    #[test]
    fn test_border_style_none_zeroes_side() {
        let style = ComputedStyle::from_declarations("border-width: 2px; border-top-style: none");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::new(0.0, 2.0, 2.0, 2.0));

        let style = ComputedStyle::from_declarations("border: 4px none");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::zero());

        // no style at all keeps the declared width
        let style = ComputedStyle::from_declarations("border-width: 2px");
        assert_eq!(resolve_border(&style, 100.0), BoxEdges::uniform(2.0));
    }

    #[test]
    fn test_font_size_and_line_height() {
        let style = ComputedStyle::new();
        assert_eq!(font_size(&style), 16.0);
        assert!((line_height(&style, 16.0) - 19.2).abs() < 1e-4);

        let style = ComputedStyle::from_declarations("font-size: 10px; line-height: 1.5");
        assert_eq!(font_size(&style), 10.0);
        assert_eq!(line_height(&style, 10.0), 15.0);

        let style = ComputedStyle::from_declarations("line-height: 20px");
        assert_eq!(line_height(&style, 10.0), 20.0);

        let style = ComputedStyle::from_declarations("line-height: 150%");
        assert_eq!(line_height(&style, 10.0), 15.0);

        let style = ComputedStyle::from_declarations("font-size: -3px");
        assert_eq!(font_size(&style), 16.0);
    }

    #[test]
    fn test_font_spec_from_style() {
        let style = ComputedStyle::from_declarations(
            "font-family: 'Courier New', monospace; font-weight: 700; font-style: italic; font-size: 12px",
        );
        let spec = font_spec(&style);
        assert_eq!(spec.family, FontFamily::Courier);
        assert!(spec.is_bold());
        assert!(spec.is_italic());
        assert_eq!(spec.size, 12.0);
    }
}
