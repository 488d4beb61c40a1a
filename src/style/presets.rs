//! Built-in style presets

use std::collections::BTreeMap;

use super::color::AssColor;
use super::{HorizontalAlign, Position, Style};

/// Preset used when a request names none
pub const DEFAULT_PRESET: &str = "classic";

/// Immutable table of named base styles
#[derive(Debug, Clone, PartialEq)]
pub struct PresetTable {
    presets: BTreeMap<String, Style>,
}

impl PresetTable {
    /// Table holding `classic`, `modern`, `premium` and `minimal`
    pub fn builtin() -> Self {
        let classic = base_style();

        let modern = Style {
            border_style: 4,
            outline_width: 1.0,
            shadow_offset: 0.0,
            outline_color: AssColor::rgb(0x0F, 0x0F, 0x0F),
            back_color: AssColor::BLACK.with_alpha(0x80),
            ..base_style()
        };

        let premium = Style {
            bold: true,
            margin_v: 60,
            margin_l: 40,
            margin_r: 40,
            max_chars_per_line: 32,
            max_words_per_line: 5,
            ..modern.clone()
        };

        let minimal = Style {
            outline_width: 0.0,
            shadow_offset: 0.0,
            border_style: 1,
            back_color: AssColor::TRANSPARENT,
            ..base_style()
        };

        Self::from_iter([
            ("classic", classic),
            ("modern", modern),
            ("premium", premium),
            ("minimal", minimal),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Style> {
        self.presets.get(&name.trim().to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Add or replace a preset
    pub fn insert(&mut self, name: &str, style: Style) {
        self.presets.insert(name.trim().to_lowercase(), style);
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> FromIterator<(&'a str, Style)> for PresetTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, Style)>>(iter: I) -> Self {
        let mut table = Self {
            presets: BTreeMap::new(),
        };
        for (name, style) in iter {
            table.insert(name, style);
        }
        table
    }
}

/// Global defaults shared by every preset: white outlined Arial at the bottom
pub fn base_style() -> Style {
    Style {
        font_name: "Arial".to_string(),
        font_size: 48,
        alignment: HorizontalAlign::Center,
        position: Position::Bottom,
        margin_v: 30,
        margin_l: 10,
        margin_r: 10,
        line_color: AssColor::WHITE,
        outline_color: AssColor::BLACK,
        back_color: AssColor::TRANSPARENT,
        word_color: AssColor::YELLOW,
        bold: false,
        italic: false,
        underline: false,
        strikeout: false,
        border_style: 1,
        outline_width: 2.0,
        shadow_offset: 1.0,
        max_words_per_line: 7,
        max_chars_per_line: 42,
        all_caps: false,
        language: "auto".to_string(),
    }
}
