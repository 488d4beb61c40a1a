/*!
 * Filter graph assembly.
 *
 * Merges the padding background, the subtitle layer and the title directives
 * into one `-filter_complex` string whose final output is labelled `[vout]`.
 * Input 0 is always the source video; an image background is input 1 and
 * must be looped by the renderer. Generated backgrounds are infinite, so the
 * overlay ends with the video.
 */

use std::path::{Path, PathBuf};

use crate::composer::DrawTextDirective;
use crate::padding::{GradientDirection, PaddingBackground, PaddingLayout, PatternKind};
use crate::style::AssColor;

/// Label of the final video stream
pub const OUTPUT_LABEL: &str = "vout";

/// Subtitle layer drawn on top of the padded canvas
#[derive(Debug, Clone, PartialEq)]
pub enum SubtitleLayer {
    None,
    /// ASS document on disk, rendered with libass
    AssTrack {
        path: PathBuf,
        fonts_dir: Option<PathBuf>,
    },
    /// drawtext filters applied in order
    DrawText(Vec<DrawTextDirective>),
}

/// Assembled filter graph
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub filter_complex: String,
    /// Extra input (background image) that must follow the video input
    pub background_input: Option<String>,
}

/// Escape a path for use as a filter option value
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// `geq` expression interpolating one channel between two colours by `t`
fn channel_expr(from: u8, to: u8, t: &str) -> String {
    format!("{}+({})*({})", from, i32::from(to) - i32::from(from), t)
}

fn gradient_geq(start: AssColor, end: AssColor, t: &str) -> String {
    format!(
        "geq=r='{}':g='{}':b='{}'",
        channel_expr(start.r, end.r, t),
        channel_expr(start.g, end.g, t),
        channel_expr(start.b, end.b, t)
    )
}

fn pattern_geq(color1: AssColor, color2: AssColor, cond: &str) -> String {
    format!(
        "geq=r='if({c},{},{})':g='if({c},{},{})':b='if({c},{},{})'",
        color2.r,
        color1.r,
        color2.g,
        color1.g,
        color2.b,
        color1.b,
        c = cond
    )
}

/// Chain producing the padded canvas with the video on it, labelled `[base]`
fn background_chain(layout: &PaddingLayout) -> (String, Option<String>) {
    let (cw, ch) = (layout.canvas_width, layout.canvas_height);
    let (x, y) = (layout.video_x, layout.video_y);
    let overlay = format!("[bg][0:v]overlay={}:{}:shortest=1[base]", x, y);
    let canvas = format!("color=s={}x{}:c=black,format=rgb24", cw, ch);

    match &layout.background {
        PaddingBackground::Solid { color } => (
            format!("[0:v]pad={}:{}:{}:{}:color={}[base]", cw, ch, x, y, color.to_ffmpeg()),
            None,
        ),
        PaddingBackground::Gradient { start, end, direction } => {
            let t = match direction {
                GradientDirection::Horizontal => "X/W".to_string(),
                GradientDirection::Vertical => "Y/H".to_string(),
                GradientDirection::Radial => {
                    // centred on the top band when there is one
                    let cy = if y > 0 { y / 2 } else { ch / 2 };
                    let radius = (cw.max(y) / 2).max(1);
                    format!("min(1,hypot(X-{},Y-{})/{})", cw / 2, cy, radius)
                }
            };
            (
                format!("{},{}[bg];{}", canvas, gradient_geq(*start, *end, &t), overlay),
                None,
            )
        }
        PaddingBackground::Pattern { kind, size, color1, color2 } => {
            let cond = match kind {
                PatternKind::Checkerboard => format!("mod(floor(X/{s})+floor(Y/{s}),2)", s = size),
                PatternKind::Stripes => format!("mod(floor(X/{}),2)", size),
            };
            (
                format!("{},{}[bg];{}", canvas, pattern_geq(*color1, *color2, &cond), overlay),
                None,
            )
        }
        PaddingBackground::Image { source } => (
            format!("[1:v]scale={}:{},setsar=1[bg];{}", cw, ch, overlay),
            Some(source.clone()),
        ),
    }
}

/// Merge padding, subtitles and title into a single filter graph
pub fn build_filter_graph(layout: &PaddingLayout, subtitles: &SubtitleLayer) -> FilterGraph {
    let (mut graph, background_input) = if layout.is_padded() {
        let (chain, input) = background_chain(layout);
        (format!("{};", chain), input)
    } else {
        (String::new(), None)
    };
    let source = if layout.is_padded() { "[base]" } else { "[0:v]" };

    let mut filters: Vec<String> = Vec::new();
    match subtitles {
        SubtitleLayer::None => {}
        SubtitleLayer::AssTrack { path, fonts_dir } => {
            let mut filter = format!("ass='{}'", escape_filter_path(path));
            if let Some(dir) = fonts_dir {
                filter.push_str(&format!(":fontsdir='{}'", escape_filter_path(dir)));
            }
            filters.push(filter);
        }
        SubtitleLayer::DrawText(directives) => {
            filters.extend(directives.iter().map(DrawTextDirective::to_filter));
        }
    }
    filters.extend(layout.title.iter().map(DrawTextDirective::to_filter));

    if filters.is_empty() {
        filters.push("null".to_string());
    }
    graph.push_str(&format!("{}{}[{}]", source, filters.join(","), OUTPUT_LABEL));

    FilterGraph {
        filter_complex: graph,
        background_input,
    }
}
