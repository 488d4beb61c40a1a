/*!
 * Padding geometry and title layout.
 *
 * The source video is placed on a larger canvas at `(left, top)`. The bands
 * around it are filled with a background, and an optional title is shaped
 * into the top band (or the bottom band when there is no top padding).
 */

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::composer::{DrawTextDirective, VideoGeometry};
use crate::errors::LayoutError;
use crate::style::{AssColor, HorizontalAlign};
use crate::text_shaper::TextShaper;

/// Margin kept free above and below a title block, per side
pub const TITLE_SAFETY_MARGIN: f64 = 20.0;

/// Minimum distance of a title from its region's edge
pub const TITLE_EDGE_FLOOR: f64 = 10.0;

/// Horizontal inset of left and right aligned titles
pub const TITLE_SIDE_INSET: f64 = 20.0;

/// Factor applied once to the font size of a title that does not fit
pub const TITLE_SHRINK_FACTOR: f64 = 0.9;

/// Gradient axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    #[default]
    Vertical,
    Horizontal,
    Radial,
}

/// Tiled two-colour pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    #[default]
    Checkerboard,
    Stripes,
}

/// How the padding bands are filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum PaddingBackground {
    Solid {
        color: AssColor,
    },
    Gradient {
        start: AssColor,
        end: AssColor,
        #[serde(default)]
        direction: GradientDirection,
    },
    Pattern {
        #[serde(default)]
        kind: PatternKind,
        size: u32,
        color1: AssColor,
        color2: AssColor,
    },
    /// External image scaled to the canvas, passed through untouched
    Image {
        source: String,
    },
}

impl Default for PaddingBackground {
    fn default() -> Self {
        Self::Solid { color: AssColor::WHITE }
    }
}

/// Padding in pixels around the source video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PaddingSpec {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
    pub background: PaddingBackground,
}

impl PaddingSpec {
    pub fn is_empty(&self) -> bool {
        self.top == 0 && self.bottom == 0 && self.left == 0 && self.right == 0
    }
}

/// Title rendering effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TitleEffect {
    Simple,
    #[default]
    Outline,
    Shadow,
    Glow,
    #[serde(alias = "3d")]
    ThreeD,
}

/// Title text and its style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSpec {
    pub text: String,
    pub font_name: String,
    pub font_size: u32,
    pub font_color: AssColor,
    pub border_color: AssColor,
    pub effect: TitleEffect,
    pub placement: HorizontalAlign,
    pub language: String,
}

impl Default for TitleSpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_name: "Sarabun".to_string(),
            font_size: 50,
            font_color: AssColor::BLACK,
            border_color: AssColor::rgb(0xFF, 0xC8, 0xDD),
            effect: TitleEffect::default(),
            placement: HorizontalAlign::Center,
            language: "auto".to_string(),
        }
    }
}

/// Computed canvas, background and title directives
#[derive(Debug, Clone, PartialEq)]
pub struct PaddingLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub video_x: u32,
    pub video_y: u32,
    pub video_width: u32,
    pub video_height: u32,
    pub background: PaddingBackground,
    /// Title draw directives in drawing order
    pub title: Vec<DrawTextDirective>,
    /// Font size the title was finally drawn with
    pub title_font_size: Option<u32>,
}

impl PaddingLayout {
    /// Placement of the video on the canvas, for subtitle positioning
    pub fn geometry(&self) -> VideoGeometry {
        VideoGeometry {
            width: self.video_width,
            height: self.video_height,
            offset_x: self.video_x,
            offset_y: self.video_y,
            canvas_width: self.canvas_width,
            canvas_height: self.canvas_height,
        }
    }

    /// Whether the canvas differs from the source video
    pub fn is_padded(&self) -> bool {
        self.canvas_width != self.video_width || self.canvas_height != self.video_height
    }
}

/// Computes padding geometry and title placement
#[derive(Debug, Clone, Default)]
pub struct PaddingLayoutEngine {
    shaper: TextShaper,
}

fn check_side(side: &'static str, value: i64) -> Result<u32, LayoutError> {
    if value < 0 {
        return Err(LayoutError::NegativePadding { side, value });
    }
    u32::try_from(value).map_err(|_| LayoutError::InvalidParameter(format!("padding {} too large: {}", side, value)))
}

impl PaddingLayoutEngine {
    pub fn new(shaper: TextShaper) -> Self {
        Self { shaper }
    }

    /// Lay out the padded canvas and the optional title
    pub fn layout(
        &self,
        spec: &PaddingSpec,
        video_width: u32,
        video_height: u32,
        title: Option<&TitleSpec>,
    ) -> Result<PaddingLayout, LayoutError> {
        let top = check_side("top", spec.top)?;
        let bottom = check_side("bottom", spec.bottom)?;
        let left = check_side("left", spec.left)?;
        let right = check_side("right", spec.right)?;

        let canvas_width = i64::from(video_width) + spec.left + spec.right;
        let canvas_height = i64::from(video_height) + spec.top + spec.bottom;
        if video_width == 0 || video_height == 0 || canvas_width <= 0 || canvas_height <= 0 {
            return Err(LayoutError::InvalidCanvas {
                width: canvas_width,
                height: canvas_height,
            });
        }
        let (canvas_width, canvas_height) = match (u32::try_from(canvas_width), u32::try_from(canvas_height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(LayoutError::InvalidCanvas {
                    width: canvas_width,
                    height: canvas_height,
                });
            }
        };

        Self::check_background(&spec.background)?;

        let mut layout = PaddingLayout {
            canvas_width,
            canvas_height,
            video_x: left,
            video_y: top,
            video_width,
            video_height,
            background: spec.background.clone(),
            title: Vec::new(),
            title_font_size: None,
        };

        if let Some(title) = title.filter(|t| !t.text.trim().is_empty()) {
            let (region_y, region_h) = if top > 0 {
                (0, top)
            } else if bottom > 0 {
                (top + video_height, bottom)
            } else {
                warn!("Title requested without top or bottom padding, drawing it over the video");
                (0, canvas_height / 5)
            };
            let (directives, font_size) = self.layout_title(title, canvas_width, f64::from(region_y), f64::from(region_h));
            layout.title = directives;
            layout.title_font_size = Some(font_size);
        }

        debug!(
            "Padding layout: canvas {}x{}, video at ({}, {}), {} title directives",
            layout.canvas_width,
            layout.canvas_height,
            layout.video_x,
            layout.video_y,
            layout.title.len()
        );
        Ok(layout)
    }

    fn check_background(background: &PaddingBackground) -> Result<(), LayoutError> {
        match background {
            PaddingBackground::Pattern { size: 0, .. } => Err(LayoutError::InvalidParameter(
                "pattern_size must be positive".to_string(),
            )),
            PaddingBackground::Image { source } if source.trim().is_empty() => Err(
                LayoutError::InvalidParameter("background image source is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Shape and place the title inside its region, returning directives and the final font size
    fn layout_title(
        &self,
        title: &TitleSpec,
        canvas_width: u32,
        region_y: f64,
        region_h: f64,
    ) -> (Vec<DrawTextDirective>, u32) {
        let max_width = (f64::from(canvas_width) - 2.0 * TITLE_SIDE_INSET).max(1.0);
        let usable_h = (region_h - 2.0 * TITLE_SAFETY_MARGIN).max(1.0);

        let mut font_size = title.font_size.max(1);
        let mut shaped = self
            .shaper
            .shape(&title.text, max_width, usable_h, f64::from(font_size), &title.language);
        let block = self.shaper.block_height_px(shaped.lines.len(), f64::from(font_size));
        if block > usable_h {
            font_size = ((f64::from(font_size) * TITLE_SHRINK_FACTOR).round() as u32).max(1);
            debug!("Title block {:.0}px exceeds {:.0}px, shrinking font to {}", block, usable_h, font_size);
            shaped = self
                .shaper
                .shape(&title.text, max_width, usable_h, f64::from(font_size), &title.language);
        }

        if shaped.heading {
            if let Some(first) = shaped.lines.first_mut() {
                *first = first.trim_end_matches(':').trim_end().to_string();
            }
        }

        let font = f64::from(font_size);
        let line_height = self.shaper.block_height_px(1, font);
        let block = self.shaper.block_height_px(shaped.lines.len(), font);
        let start_y = (region_y + (region_h - block) / 2.0).max(region_y + TITLE_EDGE_FLOOR);

        let mut directives = Vec::new();
        for (k, line) in shaped.lines.iter().enumerate() {
            let text_w = self.shaper.estimate_width_px(line, font, shaped.thai);
            let x = match title.placement {
                HorizontalAlign::Left => TITLE_SIDE_INSET,
                HorizontalAlign::Center => (f64::from(canvas_width) - text_w) / 2.0,
                HorizontalAlign::Right => f64::from(canvas_width) - text_w - TITLE_SIDE_INSET,
            };
            let x = x.max(0.0).round() as i64;
            let y = (start_y + k as f64 * line_height).round() as i64;

            let main = DrawTextDirective {
                text: line.clone(),
                font_name: title.font_name.clone(),
                font_size,
                font_color: title.font_color,
                x,
                y,
                border_width: 0.0,
                border_color: title.border_color,
                shadow_offset: 0.0,
                shadow_color: title.border_color,
                box_color: None,
                window: None,
            };

            match title.effect {
                TitleEffect::Simple => directives.push(main),
                TitleEffect::Outline => directives.push(DrawTextDirective { border_width: 2.0, ..main }),
                TitleEffect::Shadow => directives.push(DrawTextDirective { shadow_offset: 2.0, ..main }),
                TitleEffect::Glow => directives.push(DrawTextDirective {
                    border_width: 3.0,
                    box_color: Some(title.border_color.with_alpha(0x80)),
                    ..main
                }),
                TitleEffect::ThreeD => {
                    directives.push(DrawTextDirective {
                        font_color: title.border_color,
                        x: x + 1,
                        y: y + 1,
                        ..main.clone()
                    });
                    directives.push(main);
                }
            }
        }
        (directives, font_size)
    }
}
