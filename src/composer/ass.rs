//! ASS subtitle track generation

use crate::style::Style;
use crate::subtitle_processor::{Cue, DEFAULT_STYLE_REF};

use super::VideoGeometry;

// ---- time quantization (ASS is 1/100s) ----
/// Format seconds as `H:MM:SS.cc`
pub fn format_ass_time(seconds: f64) -> String {
    let total = (seconds.max(0.0) * 100.0).round() as u64;
    let h = total / 360_000;
    let m = (total % 360_000) / 6_000;
    let s = (total % 6_000) / 100;
    let c = total % 100;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, c)
}

/// Keep dialogue text from being read as override blocks or line breaks
pub fn escape_ass_text(line: &str) -> String {
    line.replace('\\', "\u{29F5}")
        .replace('{', "(")
        .replace('}', ")")
}

fn flag(value: bool) -> i8 {
    if value { -1 } else { 0 }
}

/// `Style:` line in the column order of the V4+ format header
pub fn style_line(name: &str, style: &Style) -> String {
    format!(
        "Style: {name},{font},{size},{pri},{sec},{out},{back},{bold},{italic},{underline},{strike},100,100,0,0,{border},{outline},{shadow},{align},{ml},{mr},{mv},1",
        name = name,
        font = style.font_name,
        size = style.font_size,
        pri = style.line_color.to_ass(),
        sec = style.word_color.to_ass(),
        out = style.outline_color.to_ass(),
        back = style.back_color.to_ass(),
        bold = flag(style.bold),
        italic = flag(style.italic),
        underline = flag(style.underline),
        strike = flag(style.strikeout),
        border = style.border_style,
        outline = style.outline_width,
        shadow = style.shadow_offset,
        align = style.an_code(),
        ml = style.margin_l,
        mr = style.margin_r,
        mv = style.margin_v,
    )
}

/// Build a complete ASS document for the wrapped cues
///
/// The script resolution equals the output canvas, and every dialogue line
/// carries an explicit `\an`/`\pos` anchor.
pub fn build_ass_document(cues: &[Cue], style: &Style, geometry: &VideoGeometry) -> String {
    let (x, y) = super::anchor_point(style, geometry);
    let tag = format!("{{\\an{}\\pos({},{})}}", style.an_code(), x, y);

    let mut doc = format!(
        r#"[Script Info]
ScriptType: v4.00+
PlayResX: {w}
PlayResY: {h}
WrapStyle: 2
ScaledBorderAndShadow: yes

[V4+ Styles]
Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding
{style}

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
"#,
        w = geometry.canvas_width,
        h = geometry.canvas_height,
        style = style_line(DEFAULT_STYLE_REF, style),
    );

    for cue in cues {
        let text = cue
            .lines
            .iter()
            .map(|l| escape_ass_text(l))
            .collect::<Vec<_>>()
            .join("\\N");
        doc.push_str(&format!(
            "Dialogue: 0,{},{},{},,0,0,0,,{}{}\n",
            format_ass_time(cue.start),
            format_ass_time(cue.end),
            cue.style_ref,
            tag,
            text
        ));
    }
    doc
}
