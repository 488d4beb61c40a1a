//! drawtext directives for burning text into video pixels

use serde::Serialize;

use crate::style::{AssColor, HorizontalAlign, Position, Style};
use crate::subtitle_processor::Cue;
use crate::text_shaper::TextShaper;

use super::VideoGeometry;

/// One `drawtext` invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawTextDirective {
    pub text: String,
    pub font_name: String,
    pub font_size: u32,
    pub font_color: AssColor,
    pub x: i64,
    pub y: i64,
    pub border_width: f64,
    pub border_color: AssColor,
    pub shadow_offset: f64,
    pub shadow_color: AssColor,
    /// Box drawn behind the text
    pub box_color: Option<AssColor>,
    /// Visible interval in seconds; `None` means always visible
    pub window: Option<(f64, f64)>,
}

/// Escape a value for a single-quoted drawtext option inside a filter graph
pub fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\:"),
            '%' => out.push_str("\\%"),
            _ => out.push(c),
        }
    }
    out
}

impl DrawTextDirective {
    /// Render the directive as a filter, without input or output labels
    pub fn to_filter(&self) -> String {
        let mut filter = format!(
            "drawtext=text='{}':font='{}':fontsize={}:fontcolor={}:x={}:y={}",
            escape_drawtext(&self.text),
            escape_drawtext(&self.font_name),
            self.font_size,
            self.font_color.to_ffmpeg(),
            self.x,
            self.y
        );
        if self.border_width > 0.0 {
            filter.push_str(&format!(
                ":borderw={}:bordercolor={}",
                self.border_width,
                self.border_color.to_ffmpeg()
            ));
        }
        if self.shadow_offset > 0.0 {
            filter.push_str(&format!(
                ":shadowx={o}:shadowy={o}:shadowcolor={}",
                self.shadow_color.to_ffmpeg(),
                o = self.shadow_offset
            ));
        }
        if let Some(color) = self.box_color {
            filter.push_str(&format!(":box=1:boxcolor={}:boxborderw=8", color.to_ffmpeg()));
        }
        if let Some((start, end)) = self.window {
            filter.push_str(&format!(":enable='between(t,{:.3},{:.3})'", start, end));
        }
        filter
    }
}

/// Lay out every line of every cue as a drawtext directive
///
/// The block of a cue is placed from the margins: top rows start at
/// `margin_v`, bottom rows end at `margin_v` from the bottom, middle rows are
/// centred. Explicit coordinates centre the block vertically on `y`.
pub fn build_directives(
    cues: &[Cue],
    style: &Style,
    geometry: &VideoGeometry,
    shaper: &TextShaper,
) -> Vec<DrawTextDirective> {
    let font = f64::from(style.font_size);
    let line_height = shaper.block_height_px(1, font);
    let thai = style.is_thai();
    let (ox, oy) = (f64::from(geometry.offset_x), f64::from(geometry.offset_y));
    let (w, h) = (f64::from(geometry.width), f64::from(geometry.height));

    let mut directives = Vec::new();
    for cue in cues {
        let block = shaper.block_height_px(cue.lines.len(), font);
        let top = match style.position {
            Position::Top => oy + f64::from(style.margin_v),
            Position::Middle => oy + (h - block) / 2.0,
            Position::Bottom => oy + h - f64::from(style.margin_v) - block,
            Position::Explicit { y, .. } => y as f64 - block / 2.0,
        };

        for (k, line) in cue.lines.iter().enumerate() {
            let line_thai = thai || shaper.is_thai(line, &style.language);
            let text_w = shaper.estimate_width_px(line, font, line_thai);
            let x = match (style.position, style.alignment) {
                (Position::Explicit { x, .. }, HorizontalAlign::Left) => x as f64,
                (Position::Explicit { x, .. }, HorizontalAlign::Center) => x as f64 - text_w / 2.0,
                (Position::Explicit { x, .. }, HorizontalAlign::Right) => x as f64 - text_w,
                (_, HorizontalAlign::Left) => ox + f64::from(style.margin_l),
                (_, HorizontalAlign::Center) => ox + (w - text_w) / 2.0,
                (_, HorizontalAlign::Right) => ox + w - f64::from(style.margin_r) - text_w,
            };

            directives.push(DrawTextDirective {
                text: line.clone(),
                font_name: style.font_name.clone(),
                font_size: style.font_size,
                font_color: style.line_color,
                x: x.max(0.0).round() as i64,
                y: (top + k as f64 * line_height).max(0.0).round() as i64,
                border_width: style.outline_width,
                border_color: style.outline_color,
                shadow_offset: style.shadow_offset,
                shadow_color: style.outline_color.with_alpha(0x80),
                box_color: style.has_box().then_some(style.back_color),
                window: Some((cue.start, cue.end)),
            });
        }
    }
    directives
}
