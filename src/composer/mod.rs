/*!
 * Subtitle composition.
 *
 * Turns timed cues with raw text into wrapped, ordered, non-overlapping cues
 * and the renderer directive that draws them: either an ASS track or a list
 * of drawtext filters.
 */

pub mod ass;
pub mod burn_in;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::app_config::{ComposerConfig, OutputMode};
use crate::cancellation::CancellationToken;
use crate::errors::CaptionError;
use crate::style::{Position, Style};
use crate::subtitle_processor::{Cue, DEFAULT_STYLE_REF};
use crate::text_shaper::{TextShaper, WrapLimits};

pub use burn_in::DrawTextDirective;

/// Placement of the source video on the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGeometry {
    /// Source video width
    pub width: u32,
    /// Source video height
    pub height: u32,
    /// Left padding
    pub offset_x: u32,
    /// Top padding
    pub offset_y: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl VideoGeometry {
    /// Geometry of a video without padding
    pub fn unpadded(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            offset_x: 0,
            offset_y: 0,
            canvas_width: width,
            canvas_height: height,
        }
    }
}

/// Anchor point of subtitles on the canvas
///
/// Explicit coordinates are absolute on the canvas. Otherwise the row of the
/// 3x3 grid (h/6, h/2, 5h/6) and the alignment inside the margins decide,
/// measured inside the video area and shifted by the padding.
pub fn anchor_point(style: &Style, geometry: &VideoGeometry) -> (i64, i64) {
    if let Position::Explicit { x, y } = style.position {
        return (x, y);
    }

    let w = i64::from(geometry.width);
    let h = i64::from(geometry.height);
    let x = match style.alignment {
        crate::style::HorizontalAlign::Left => i64::from(style.margin_l),
        crate::style::HorizontalAlign::Center => w / 2,
        crate::style::HorizontalAlign::Right => w - i64::from(style.margin_r),
    };
    let y = match style.position {
        Position::Top => h / 6,
        Position::Middle => h / 2,
        _ => 5 * h / 6,
    };
    (x + i64::from(geometry.offset_x), y + i64::from(geometry.offset_y))
}

/// Literal text substitution applied to every cue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub find: String,
    pub replace: String,
}

/// Per-request composition parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComposeOptions {
    pub mode: OutputMode,
    /// Cues ending before this time are dropped, straddling ones clamped
    pub min_start: f64,
    /// Applied in order before upper-casing
    pub replacements: Vec<Replacement>,
}

/// Directive handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub enum RenderDirective {
    /// Complete ASS document rendered with the `ass` filter
    SubtitleTrack { ass: String },
    /// drawtext filters applied in order
    BurnIn { filters: Vec<DrawTextDirective> },
}

/// Wrapped cues together with their directive
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub cues: Vec<Cue>,
    pub directive: RenderDirective,
}

/// Wraps cues and produces renderer directives
#[derive(Debug, Clone)]
pub struct SubtitleComposer {
    shaper: TextShaper,
    config: ComposerConfig,
}

impl SubtitleComposer {
    pub fn new(shaper: TextShaper, config: ComposerConfig) -> Self {
        Self { shaper, config }
    }

    pub fn shaper(&self) -> &TextShaper {
        &self.shaper
    }

    /// Wrap cues and build the directive for the requested mode
    pub fn compose(
        &self,
        cues: &[Cue],
        style: &Style,
        geometry: &VideoGeometry,
        options: &ComposeOptions,
        token: &CancellationToken,
    ) -> Result<Composition, CaptionError> {
        let cues = self.wrap_cues(cues, style, geometry, options, token)?;
        token.checkpoint()?;

        let directive = match options.mode {
            OutputMode::Track => RenderDirective::SubtitleTrack {
                ass: ass::build_ass_document(&cues, style, geometry),
            },
            OutputMode::BurnIn => RenderDirective::BurnIn {
                filters: burn_in::build_directives(&cues, style, geometry, &self.shaper),
            },
        };
        info!("Composed {} cues ({:?} mode)", cues.len(), options.mode);

        Ok(Composition { cues, directive })
    }

    /// Width available to one subtitle line in pixels
    fn line_width(style: &Style, geometry: &VideoGeometry) -> f64 {
        let width = match style.position {
            Position::Explicit { .. } => geometry.canvas_width,
            _ => geometry.width,
        };
        f64::from(width.saturating_sub(style.margin_l + style.margin_r).max(1))
    }

    /// Replace, upper-case, wrap and order cues
    ///
    /// Output cues start in non-decreasing order and overlap their successor
    /// by at most the configured epsilon. Cues with identical start times are
    /// merged into one.
    pub fn wrap_cues(
        &self,
        cues: &[Cue],
        style: &Style,
        geometry: &VideoGeometry,
        options: &ComposeOptions,
        token: &CancellationToken,
    ) -> Result<Vec<Cue>, CaptionError> {
        let limits = WrapLimits {
            max_chars: style.max_chars_per_line,
            max_words: style.max_words_per_line,
            max_width_px: Self::line_width(style, geometry),
            font_size: f64::from(style.font_size),
        };

        let mut out: Vec<Cue> = Vec::with_capacity(cues.len());
        for cue in cues {
            token.checkpoint()?;

            if cue.end <= options.min_start {
                debug!("Dropping cue ending at {:.3}s before {:.3}s", cue.end, options.min_start);
                continue;
            }
            let start = cue.start.max(options.min_start);
            if cue.end <= start {
                continue;
            }
            if start > cue.start && cue.end - start < self.config.min_cue_duration {
                debug!("Dropping cue clamped to {:.3}s at {:.3}s", cue.end - start, start);
                continue;
            }

            let mut text = cue.lines.join(" ");
            for r in options.replacements.iter().filter(|r| !r.find.is_empty()) {
                text = text.replace(&r.find, &r.replace);
            }
            if style.all_caps {
                text = text.to_uppercase();
            }

            let lines = self.shaper.wrap_lines(&text, &limits, &style.language);
            if lines.is_empty() {
                debug!("Dropping blank cue at {:.3}s", cue.start);
                continue;
            }

            out.push(Cue {
                start,
                end: cue.end,
                lines,
                style_ref: DEFAULT_STYLE_REF.to_string(),
            });
        }

        out.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(self.resolve_overlaps(out))
    }

    /// Trim each cue to its successor's start
    ///
    /// A cue that trimming would leave shorter than `min_cue_duration` is
    /// folded into its successor instead, so no text is lost.
    fn resolve_overlaps(&self, cues: Vec<Cue>) -> Vec<Cue> {
        let epsilon = self.config.overlap_epsilon.max(0.0);
        let min_duration = self.config.min_cue_duration.max(0.0);
        let mut out: Vec<Cue> = Vec::with_capacity(cues.len());

        for mut cue in cues {
            if let Some(prev) = out.last_mut() {
                if (cue.start - prev.start).abs() < 1e-9 {
                    debug!("Merging cues starting at {:.3}s", cue.start);
                    prev.lines.extend(cue.lines);
                    prev.end = prev.end.max(cue.end);
                    continue;
                }
                let trimmed_end = cue.start + epsilon;
                if prev.end > trimmed_end {
                    if trimmed_end - prev.start >= min_duration {
                        prev.end = trimmed_end;
                    } else {
                        debug!("Folding {:.3}s cue into the cue at {:.3}s", trimmed_end - prev.start, cue.start);
                        let mut lines = std::mem::take(&mut prev.lines);
                        lines.append(&mut cue.lines);
                        cue.lines = lines;
                        cue.end = cue.end.max(prev.end);
                        cue.start = prev.start;
                        out.pop();
                    }
                }
            }
            out.push(cue);
        }
        out
    }
}
