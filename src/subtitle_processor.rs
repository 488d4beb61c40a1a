use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @module: Timed text model and SRT reading/writing

// @const: SRT timestamp line, accepting ',' or '.' before the milliseconds
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})").unwrap()
});

/// Name of the style every cue refers to unless told otherwise
pub const DEFAULT_STYLE_REF: &str = "Default";

// @struct: Timed unit of transcribed speech
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    // @field: Start in seconds
    pub start: f64,

    // @field: End in seconds
    pub end: f64,

    // @field: Spoken text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Duration in seconds (never negative)
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

// @struct: Timed block of subtitle text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    // @field: Start in seconds
    pub start: f64,

    // @field: End in seconds
    pub end: f64,

    // @field: Display lines, top to bottom
    pub lines: Vec<String>,

    // @field: Name of the style the cue is rendered with
    pub style_ref: String,
}

impl Cue {
    /// Creates an unwrapped cue holding one line of raw text
    pub fn raw(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            lines: vec![text.into()],
            style_ref: DEFAULT_STYLE_REF.to_string(),
        }
    }

    // @creates: Validated cue
    // @validates: Time range and non-empty lines
    pub fn new_validated(start: f64, end: f64, lines: Vec<String>, style_ref: &str) -> Result<Self> {
        if !(end > start) {
            return Err(anyhow!("Invalid time range: end time {} <= start time {}", end, start));
        }

        let lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(anyhow!("Empty cue text at {:.3}s", start));
        }

        Ok(Self {
            start,
            end,
            lines,
            style_ref: style_ref.to_string(),
        })
    }

    /// All lines joined with single spaces
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm` or `HH:MM:SS.mmm`) to seconds
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let parts: Vec<&str> = timestamp.trim().split(&[':', ',', '.'][..]).collect();

    if parts.len() != 4 {
        return Err(anyhow!("Invalid timestamp format: {}", timestamp));
    }

    let hours: u64 = parts[0].parse().context("Failed to parse hours")?;
    let minutes: u64 = parts[1].parse().context("Failed to parse minutes")?;
    let seconds: u64 = parts[2].parse().context("Failed to parse seconds")?;
    let millis: u64 = parts[3].parse().context("Failed to parse milliseconds")?;

    if minutes >= 60 || seconds >= 60 || millis >= 1000 {
        return Err(anyhow!("Invalid time components in timestamp: {}", timestamp));
    }

    let total_ms = hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis;
    Ok(total_ms as f64 / 1000.0)
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Whether a caption source is already a complete ASS/SSA document
pub fn is_ass_document(content: &str) -> bool {
    content.trim_start_matches('\u{feff}').trim_start().starts_with("[Script Info]")
}

/// Whether a caption source looks like SRT content
pub fn looks_like_srt(content: &str) -> bool {
    TIMESTAMP_REGEX.is_match(content)
}

/// Read SRT content from a file into transcript segments
pub fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Vec<TranscriptSegment>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
    parse_srt_string(&content)
}

/// Parse SRT content into transcript segments
///
/// Entries are returned sorted by start time. Malformed entries are skipped
/// with a warning; content without any valid entry is an error.
pub fn parse_srt_string(content: &str) -> Result<Vec<TranscriptSegment>> {
    let mut segments = Vec::new();

    let mut current_times: Option<(f64, f64)> = None;
    let mut current_text = String::new();
    let mut expecting_index = true;

    let mut flush = |times: Option<(f64, f64)>, text: &mut String| {
        if let Some((start, end)) = times {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                warn!("Skipping empty subtitle entry at {:.3}s", start);
            } else if end <= start {
                warn!("Skipping subtitle entry with invalid range {:.3}s -> {:.3}s", start, end);
            } else {
                segments.push(TranscriptSegment::new(start, end, trimmed));
            }
        }
        text.clear();
    };

    for (line_count, line) in content.lines().enumerate() {
        let trimmed = line.trim().trim_start_matches('\u{feff}');

        if trimmed.is_empty() {
            if current_times.is_some() {
                flush(current_times.take(), &mut current_text);
            }
            expecting_index = true;
            continue;
        }

        if expecting_index && current_times.is_none() && trimmed.parse::<usize>().is_ok() {
            expecting_index = false;
            continue;
        }

        if current_times.is_none() {
            if let Some(caps) = TIMESTAMP_REGEX.captures(trimmed) {
                current_times = Some((timestamp_from_caps(&caps, 1), timestamp_from_caps(&caps, 5)));
                expecting_index = false;
                continue;
            }
            warn!("Unexpected text at line {} before timestamp: {}", line_count + 1, trimmed);
            continue;
        }

        if !current_text.is_empty() {
            current_text.push('\n');
        }
        current_text.push_str(trimmed);
    }
    flush(current_times.take(), &mut current_text);

    if segments.is_empty() {
        return Err(anyhow!("No valid subtitle entries were found in the SRT content"));
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let overlap_count = segments.windows(2).filter(|w| w[0].end > w[1].start).count();
    if overlap_count > 0 {
        warn!("Found {} overlapping subtitle entries", overlap_count);
    }
    debug!("Parsed {} SRT entries", segments.len());

    Ok(segments)
}

fn timestamp_from_caps(caps: &regex::Captures, start_idx: usize) -> f64 {
    let field = |i: usize| -> u64 {
        caps.get(start_idx + i)
            .map_or(0, |m| m.as_str().parse().unwrap_or(0))
    };
    // "5" after the separator means 500ms
    let millis_raw = caps.get(start_idx + 3).map_or("0", |m| m.as_str());
    let millis = field(3) * 10u64.pow(3 - millis_raw.len().min(3) as u32);

    ((field(0) * 3600 + field(1) * 60 + field(2)) * 1000 + millis) as f64 / 1000.0
}

/// Render cues as SRT text, numbering them from 1
pub fn cues_to_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.lines.join("\n")
        ));
    }
    out
}

/// Write cues to an SRT file
pub fn write_srt<P: AsRef<Path>>(cues: &[Cue], path: P) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = File::create(path)
        .with_context(|| format!("Failed to create subtitle file: {}", path.display()))?;
    file.write_all(cues_to_srt(cues).as_bytes())?;

    Ok(())
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} --> {}", format_timestamp(self.start), format_timestamp(self.end))?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
