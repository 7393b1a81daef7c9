//! Font selection from CSS-like values

use serde::{Deserialize, Serialize};

/// Font style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

impl FontStyle {
    /// `italic` and `oblique` select the slanted face
    pub fn from_css(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "italic" || v.starts_with("oblique") => Self::Italic,
            _ => Self::Normal,
        }
    }
}

/// Font weight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

impl FontWeight {
    /// `bold`, `bolder` and numeric weights of 600 and above are bold
    pub fn from_css(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim) else {
            return Self::Normal;
        };
        if value.eq_ignore_ascii_case("bold") || value.eq_ignore_ascii_case("bolder") {
            return Self::Bold;
        }
        match value.parse::<u16>() {
            Ok(weight) if weight >= 600 => Self::Bold,
            _ => Self::Normal,
        }
    }
}

/// The built-in families text is measured with.
///
/// Anything the measurement tables do not know maps onto the default sans
/// family rather than failing the conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Resolve the first entry of a `font-family` list
    pub fn from_css(value: Option<&str>) -> Self {
        let Some(list) = value else {
            return Self::default();
        };
        let first = list.split(',').next().unwrap_or("");
        let name = first.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        match name.to_ascii_lowercase().as_str() {
            "arial" | "helvetica" | "sans-serif" => Self::Helvetica,
            "times" | "times new roman" | "serif" => Self::Times,
            "courier" | "courier new" | "monospace" => Self::Courier,
            _ => Self::default(),
        }
    }

    /// PostScript base name of the upright regular face
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::Times => "Times",
            Self::Courier => "Courier",
        }
    }
}

/// Everything a measurer needs to know about the face and size of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: FontFamily,
    pub weight: FontWeight,
    pub style: FontStyle,
    /// Size in layout units
    pub size: f32,
}

impl FontSpec {
    pub fn new(family: FontFamily, size: f32) -> Self {
        Self {
            family,
            weight: FontWeight::Normal,
            style: FontStyle::Normal,
            size,
        }
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn is_bold(&self) -> bool {
        self.weight == FontWeight::Bold
    }

    pub fn is_italic(&self) -> bool {
        self.style == FontStyle::Italic
    }

    /// Core font name, e.g. `Helvetica-BoldOblique` or `Times-Italic`
    pub fn face_name(&self) -> String {
        let base = self.family.base_name();
        let slant = match self.family {
            FontFamily::Times => "Italic",
            FontFamily::Helvetica | FontFamily::Courier => "Oblique",
        };
        match (self.is_bold(), self.is_italic()) {
            (false, false) if self.family == FontFamily::Times => "Times-Roman".to_string(),
            (false, false) => base.to_string(),
            (true, false) => format!("{base}-Bold"),
            (false, true) => format!("{base}-{slant}"),
            (true, true) => format!("{base}-Bold{slant}"),
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new(FontFamily::default(), 16.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_resolution() {
        assert_eq!(FontFamily::from_css(Some("Arial, sans-serif")), FontFamily::Helvetica);
        assert_eq!(FontFamily::from_css(Some("'Times New Roman', serif")), FontFamily::Times);
        assert_eq!(FontFamily::from_css(Some("\"Courier New\"")), FontFamily::Courier);
        assert_eq!(FontFamily::from_css(Some("Comic Sans MS")), FontFamily::Helvetica);
        assert_eq!(FontFamily::from_css(None), FontFamily::Helvetica);
    }

    #[test]
    fn test_weight_and_style() {
        assert_eq!(FontWeight::from_css(Some("bold")), FontWeight::Bold);
        assert_eq!(FontWeight::from_css(Some("700")), FontWeight::Bold);
        assert_eq!(FontWeight::from_css(Some("400")), FontWeight::Normal);
        assert_eq!(FontWeight::from_css(Some("heavy-ish")), FontWeight::Normal);
        assert_eq!(FontStyle::from_css(Some(" italic ")), FontStyle::Italic);
        assert_eq!(FontStyle::from_css(Some("oblique 10deg")), FontStyle::Italic);
        assert_eq!(FontStyle::from_css(Some("normal")), FontStyle::Normal);
    }

    #[test]
    fn test_face_names() {
        let spec = FontSpec::new(FontFamily::Times, 12.0);
        assert_eq!(spec.face_name(), "Times-Roman");
        assert_eq!(spec.with_style(FontStyle::Italic).face_name(), "Times-Italic");
        let spec = FontSpec::new(FontFamily::Helvetica, 12.0)
            .with_weight(FontWeight::Bold)
            .with_style(FontStyle::Italic);
        assert_eq!(spec.face_name(), "Helvetica-BoldOblique");
    }
}
