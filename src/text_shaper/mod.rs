/*!
 * Language-aware line breaking and size fitting.
 *
 * Width is estimated from display cells and a per-script average glyph
 * width; no font metrics are consulted. Two entry points exist:
 *
 * - [`TextShaper::shape_lines`] balances text across a target line count,
 *   which suits titles drawn inside padding regions.
 * - [`TextShaper::wrap_lines`] wraps greedily under per-line character and
 *   word limits, which suits timed subtitle cues.
 */

pub mod latin;
pub mod segmenter;
pub mod thai;

use std::sync::Arc;

use log::debug;

use crate::app_config::ShapingConfig;
use crate::language_utils::{contains_thai, display_width, is_thai_language, thai_ratio};

pub use segmenter::{DictionarySegmenter, NullSegmenter, ThaiSegmenter};

/// Result of [`TextShaper::shape`]
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedText {
    /// Display lines, never empty
    pub lines: Vec<String>,

    /// Whether the first line is a heading split off at a colon
    pub heading: bool,

    /// Whether the text was treated as Thai
    pub thai: bool,
}

/// Per-line limits for greedy cue wrapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapLimits {
    /// Maximum display cells per line (0 = width bound only)
    pub max_chars: usize,

    /// Maximum words per line (0 = unlimited)
    pub max_words: usize,

    /// Width available to a line in pixels
    pub max_width_px: f64,

    /// Font size in pixels
    pub font_size: f64,
}

/// Line breaker parameterised by shaping constants and a Thai segmenter
#[derive(Clone)]
pub struct TextShaper {
    config: ShapingConfig,
    segmenter: Arc<dyn ThaiSegmenter>,
}

impl std::fmt::Debug for TextShaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextShaper")
            .field("config", &self.config)
            .field("segmenter", &self.segmenter.name())
            .finish()
    }
}

impl Default for TextShaper {
    fn default() -> Self {
        Self::heuristic(ShapingConfig::default())
    }
}

impl TextShaper {
    pub fn new(config: ShapingConfig, segmenter: Arc<dyn ThaiSegmenter>) -> Self {
        Self { config, segmenter }
    }

    /// Shaper without a segmenter, relying on Thai heuristics
    pub fn heuristic(config: ShapingConfig) -> Self {
        Self::new(config, Arc::new(NullSegmenter))
    }

    /// Shaper using the configured Thai dictionary, or the heuristics without one
    pub fn from_config(config: ShapingConfig) -> anyhow::Result<Self> {
        match config.thai_dictionary.clone() {
            Some(path) => {
                let segmenter = DictionarySegmenter::from_file(&path)?;
                debug!("Loaded {} Thai words from {:?}", segmenter.len(), path);
                Ok(Self::new(config, Arc::new(segmenter)))
            }
            None => Ok(Self::heuristic(config)),
        }
    }

    pub fn config(&self) -> &ShapingConfig {
        &self.config
    }

    pub fn segmenter_name(&self) -> &str {
        self.segmenter.name()
    }

    /// Decide whether text is handled as Thai
    ///
    /// A strict majority of Thai code points decides on its own. The hint
    /// only matters for mixed text that has no spaces to break on.
    pub fn is_thai(&self, text: &str, language_hint: &str) -> bool {
        if thai_ratio(text) > self.config.thai_majority_ratio {
            return true;
        }
        contains_thai(text)
            && !text.trim().contains(char::is_whitespace)
            && is_thai_language(language_hint)
    }

    /// Average glyph width relative to the font size
    pub fn char_width_factor(&self, thai: bool) -> f64 {
        if thai {
            self.config.thai_char_width
        } else {
            self.config.latin_char_width
        }
    }

    /// Display cells that fit on one line (at least 1)
    pub fn chars_per_line(&self, max_width_px: f64, font_size: f64, thai: bool) -> usize {
        let cpl = (max_width_px * self.config.width_fill_ratio) / (font_size * self.char_width_factor(thai));
        if cpl.is_finite() && cpl >= 1.0 {
            cpl.floor() as usize
        } else {
            1
        }
    }

    /// Lines that fit vertically (at least 2)
    pub fn max_lines(&self, max_height_px: f64, font_size: f64) -> usize {
        let lines = max_height_px / (font_size * self.config.line_height_factor);
        if lines.is_finite() && lines >= 2.0 {
            lines.floor() as usize
        } else {
            2
        }
    }

    /// Estimated rendered width of a line in pixels
    pub fn estimate_width_px(&self, line: &str, font_size: f64, thai: bool) -> f64 {
        display_width(line) as f64 * font_size * self.char_width_factor(thai)
    }

    /// Height of a block of lines in pixels
    pub fn block_height_px(&self, lines: usize, font_size: f64) -> f64 {
        lines as f64 * font_size * self.config.line_height_factor
    }

    /// Shape text into balanced lines, see [`TextShaper::shape`]
    pub fn shape_lines(
        &self,
        text: &str,
        max_width_px: f64,
        max_height_px: f64,
        font_size: f64,
        language_hint: &str,
    ) -> Vec<String> {
        self.shape(text, max_width_px, max_height_px, font_size, language_hint).lines
    }

    /// Shape text into a balanced block of at least two lines where possible
    ///
    /// Explicit line breaks are kept; each explicit line is only re-split when
    /// it is wider than the line capacity.
    pub fn shape(
        &self,
        text: &str,
        max_width_px: f64,
        max_height_px: f64,
        font_size: f64,
        language_hint: &str,
    ) -> ShapedText {
        let text = text.trim();
        let thai = self.is_thai(text, language_hint);
        if text.is_empty() {
            return ShapedText {
                lines: vec![String::new()],
                heading: false,
                thai,
            };
        }

        if !text.contains('\n') {
            return self.shape_single(text, max_width_px, max_height_px, font_size, language_hint);
        }

        let mut lines = Vec::new();
        for raw in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let line_thai = self.is_thai(raw, language_hint);
            if display_width(raw) <= self.chars_per_line(max_width_px, font_size, line_thai) {
                lines.push(raw.to_string());
            } else {
                lines.extend(
                    self.shape_single(raw, max_width_px, max_height_px, font_size, language_hint)
                        .lines,
                );
            }
        }

        ShapedText {
            lines,
            heading: false,
            thai,
        }
    }

    fn shape_single(
        &self,
        text: &str,
        max_width_px: f64,
        max_height_px: f64,
        font_size: f64,
        language_hint: &str,
    ) -> ShapedText {
        let thai = self.is_thai(text, language_hint);
        let cpl = self.chars_per_line(max_width_px, font_size, thai);
        let cells = display_width(text);
        let target = cells
            .div_ceil(cpl)
            .clamp(2, self.max_lines(max_height_px, font_size));
        let single = |text: &str| ShapedText {
            lines: vec![text.to_string()],
            heading: false,
            thai,
        };

        if !thai {
            if let Some((heading, rest)) = latin::split_heading(text) {
                let mut lines = vec![heading];
                if display_width(&rest) > cpl {
                    let words: Vec<&str> = rest.split_whitespace().collect();
                    lines.extend(latin::greedy_wrap(&words, cpl, 0));
                } else {
                    lines.push(rest);
                }
                return ShapedText {
                    lines,
                    heading: true,
                    thai,
                };
            }
        }

        if cells < self.config.min_split_chars {
            return single(text);
        }

        let lines = if thai {
            thai::split_thai(text, target, &self.config, self.segmenter.as_ref())
        } else {
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.len() < 2 {
                return single(text);
            }
            latin::split_words(&words, target, &self.config.closing_words)
        };

        debug!("Shaped {} cells into {} lines (target {}, thai: {})", cells, lines.len(), target, thai);
        ShapedText {
            lines,
            heading: false,
            thai,
        }
    }

    /// Greedy wrap for subtitle cues
    ///
    /// Each explicit line is wrapped on its own. The capacity of a line is the
    /// smaller of `max_chars` and what fits in `max_width_px`. Returns an empty
    /// vector for blank text.
    pub fn wrap_lines(&self, text: &str, limits: &WrapLimits, language_hint: &str) -> Vec<String> {
        let mut out = Vec::new();

        for raw in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let thai = self.is_thai(raw, language_hint);
            let mut cap = self.chars_per_line(limits.max_width_px, limits.font_size, thai);
            if limits.max_chars > 0 {
                cap = cap.min(limits.max_chars);
            }

            if thai {
                let units: Vec<(String, bool)> = thai::wrap_units(raw, &self.config, self.segmenter.as_ref())
                    .into_iter()
                    .flat_map(|(unit, spaced)| {
                        thai::chunk_unit(&unit, cap)
                            .into_iter()
                            .enumerate()
                            .map(move |(i, chunk)| (chunk, spaced && i == 0))
                    })
                    .collect();
                out.extend(pack_units(&units, cap, limits.max_words));
            } else {
                let words: Vec<&str> = raw.split_whitespace().collect();
                out.extend(latin::greedy_wrap(&words, cap, limits.max_words));
            }
        }

        out
    }
}

/// Greedy packing of Thai units, re-inserting the spaces of the source
fn pack_units(units: &[(String, bool)], max_cells: usize, max_words: usize) -> Vec<String> {
    let max_words = if max_words == 0 { usize::MAX } else { max_words };
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut cells = 0;
    let mut count = 0;

    for (unit, spaced) in units {
        let w = display_width(unit);
        let sep = usize::from(*spaced && count > 0);
        if count > 0 && (cells + sep + w > max_cells || count >= max_words) {
            lines.push(std::mem::take(&mut current));
            cells = 0;
            count = 0;
        }
        if *spaced && count > 0 {
            current.push(' ');
            cells += 1;
        }
        current.push_str(unit);
        cells += w;
        count += 1;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
