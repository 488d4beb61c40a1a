/*!
 * Style resolution.
 *
 * A request names a preset and may override any field of it. Overrides are
 * applied field by field: an absent override keeps the preset value, a
 * present one always wins, including `false` and `0`.
 */

pub mod color;
pub mod presets;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::language_utils::{is_auto, is_thai_language};

pub use color::AssColor;
pub use presets::{DEFAULT_PRESET, PresetTable, base_style};

/// Font used for Thai text unless overridden
pub const THAI_FONT: &str = "Sarabun";

/// Smallest preset font size used for Thai text
pub const THAI_MIN_FONT_SIZE: u32 = 28;

/// Words per line for Thai text unless overridden
pub const THAI_MAX_WORDS_PER_LINE: usize = 4;

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

impl HorizontalAlign {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "center" | "centre" | "middle" => Some(Self::Center),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Offset within a numpad row (0, 1, 2)
    fn column(self) -> u8 {
        match self {
            Self::Left => 0,
            Self::Center => 1,
            Self::Right => 2,
        }
    }
}

/// Vertical placement of subtitles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Top,
    Middle,
    Bottom,
    /// Absolute pixel coordinates on the output canvas
    Explicit { x: i64, y: i64 },
}

impl Position {
    /// Parse `top`, `middle`, `bottom`, optionally suffixed with a column
    /// (`bottom_left`, `top_right`, ...). The column is returned separately.
    fn parse(value: &str) -> Option<(Self, Option<HorizontalAlign>)> {
        let value = value.trim().to_ascii_lowercase();
        let (row, column) = match value.split_once(|c: char| c == '_' || c == '-' || c == ' ') {
            Some((row, column)) => (row.to_string(), Some(HorizontalAlign::parse(column)?)),
            None => (value, None),
        };
        let position = match row.as_str() {
            "top" => Self::Top,
            "middle" | "center" | "centre" => Self::Middle,
            "bottom" => Self::Bottom,
            _ => return None,
        };
        Some((position, column))
    }
}

/// Fully resolved rendering style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub font_name: String,
    pub font_size: u32,
    pub alignment: HorizontalAlign,
    pub position: Position,
    pub margin_v: u32,
    pub margin_l: u32,
    pub margin_r: u32,
    pub line_color: AssColor,
    pub outline_color: AssColor,
    pub back_color: AssColor,
    /// Highlight colour, also the ASS secondary colour
    pub word_color: AssColor,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    /// ASS border style: 1 outline and shadow, 3 or 4 opaque box
    pub border_style: u8,
    pub outline_width: f64,
    pub shadow_offset: f64,
    pub max_words_per_line: usize,
    pub max_chars_per_line: usize,
    pub all_caps: bool,
    /// Declared language of the text, used as the shaping hint
    pub language: String,
}

impl Style {
    /// Numpad alignment code (`\anN`): 1-3 bottom, 4-6 middle, 7-9 top
    ///
    /// Explicit coordinates anchor the middle row.
    pub fn an_code(&self) -> u8 {
        let row_base = match self.position {
            Position::Bottom => 1,
            Position::Middle | Position::Explicit { .. } => 4,
            Position::Top => 7,
        };
        row_base + self.alignment.column()
    }

    /// Whether the text is declared Thai
    pub fn is_thai(&self) -> bool {
        is_thai_language(&self.language)
    }

    /// Whether the style draws an opaque box behind the text
    pub fn has_box(&self) -> bool {
        self.border_style >= 3 && !self.back_color.is_transparent()
    }
}

/// Optional per-field overrides of a preset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    pub font_name: Option<String>,
    pub font_size: Option<u32>,
    pub alignment: Option<String>,
    pub position: Option<String>,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub margin_v: Option<u32>,
    pub margin_l: Option<u32>,
    pub margin_r: Option<u32>,
    pub line_color: Option<String>,
    pub outline_color: Option<String>,
    pub back_color: Option<String>,
    pub word_color: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikeout: Option<bool>,
    pub border_style: Option<u8>,
    pub outline_width: Option<f64>,
    pub shadow_offset: Option<f64>,
    pub max_words_per_line: Option<usize>,
    pub max_chars_per_line: Option<usize>,
    pub all_caps: Option<bool>,
    pub language: Option<String>,
}

/// Maps a preset name plus overrides to a [`Style`]
#[derive(Debug, Clone, Default)]
pub struct StyleResolver {
    presets: PresetTable,
}

fn parse_color(field: &str, value: &str) -> Result<AssColor, ConfigError> {
    AssColor::parse(value).ok_or_else(|| ConfigError::InvalidColor {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl StyleResolver {
    pub fn new(presets: PresetTable) -> Self {
        Self { presets }
    }

    pub fn presets(&self) -> &PresetTable {
        &self.presets
    }

    /// Resolve a preset with overrides
    ///
    /// An empty preset name selects [`DEFAULT_PRESET`].
    pub fn resolve(&self, preset: &str, overrides: &StyleOverrides) -> Result<Style, ConfigError> {
        let name = if preset.trim().is_empty() { DEFAULT_PRESET } else { preset };
        let mut style = self
            .presets
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))?;

        let language = overrides
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !is_auto(l))
            .unwrap_or("auto");
        style.language = language.to_string();

        if is_thai_language(language) {
            style.font_name = THAI_FONT.to_string();
            style.font_size = style.font_size.max(THAI_MIN_FONT_SIZE);
            style.max_words_per_line = THAI_MAX_WORDS_PER_LINE;
        }

        let o = overrides;
        if let Some(v) = &o.font_name {
            style.font_name = v.clone();
        }
        if let Some(v) = o.font_size {
            style.font_size = v;
        }
        if let Some(v) = o.margin_v {
            style.margin_v = v;
        }
        if let Some(v) = o.margin_l {
            style.margin_l = v;
        }
        if let Some(v) = o.margin_r {
            style.margin_r = v;
        }
        if let Some(v) = &o.line_color {
            style.line_color = parse_color("line_color", v)?;
        }
        if let Some(v) = &o.outline_color {
            style.outline_color = parse_color("outline_color", v)?;
        }
        if let Some(v) = &o.back_color {
            style.back_color = parse_color("back_color", v)?;
        }
        if let Some(v) = &o.word_color {
            style.word_color = parse_color("word_color", v)?;
        }
        if let Some(v) = o.bold {
            style.bold = v;
        }
        if let Some(v) = o.italic {
            style.italic = v;
        }
        if let Some(v) = o.underline {
            style.underline = v;
        }
        if let Some(v) = o.strikeout {
            style.strikeout = v;
        }
        if let Some(v) = o.border_style {
            style.border_style = v;
        }
        if let Some(v) = o.outline_width {
            style.outline_width = v;
        }
        if let Some(v) = o.shadow_offset {
            style.shadow_offset = v;
        }
        if let Some(v) = o.max_words_per_line {
            style.max_words_per_line = v;
        }
        if let Some(v) = o.max_chars_per_line {
            style.max_chars_per_line = v;
        }
        if let Some(v) = o.all_caps {
            style.all_caps = v;
        }

        self.apply_placement(&mut style, o)?;
        Self::validate(&style)?;

        debug!(
            "Resolved style '{}' ({} {}px, an{}, language {})",
            name,
            style.font_name,
            style.font_size,
            style.an_code(),
            style.language
        );
        Ok(style)
    }

    fn apply_placement(&self, style: &mut Style, o: &StyleOverrides) -> Result<(), ConfigError> {
        let mut column_from_position = None;
        if let Some(v) = &o.position {
            let (position, column) = Position::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                field: "position".to_string(),
                reason: format!("unknown position '{}'", v),
            })?;
            style.position = position;
            column_from_position = column;
        }

        match (o.alignment.as_deref(), column_from_position) {
            (Some(v), _) => {
                style.alignment = HorizontalAlign::parse(v).ok_or_else(|| ConfigError::InvalidValue {
                    field: "alignment".to_string(),
                    reason: format!("unknown alignment '{}'", v),
                })?;
            }
            (None, Some(column)) => style.alignment = column,
            (None, None) => {}
        }

        match (o.x, o.y) {
            (Some(x), Some(y)) => style.position = Position::Explicit { x, y },
            (None, None) => {}
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: "x/y".to_string(),
                    reason: "x and y must be given together".to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate(style: &Style) -> Result<(), ConfigError> {
        if style.font_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "font_size".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if style.font_name.trim().is_empty() {
            return Err(ConfigError::MissingField("font_name".to_string()));
        }
        if !(style.outline_width >= 0.0) || !(style.shadow_offset >= 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "outline_width/shadow_offset".to_string(),
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }
}
