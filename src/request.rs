/*!
 * Versioned composition request.
 *
 * Every optional field has a documented default. A request is validated
 * once, before any work is scheduled.
 */

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::app_config::OutputMode;
use crate::composer::Replacement;
use crate::errors::ConfigError;
use crate::language_utils::{is_auto, normalize_to_part2t};
use crate::padding::{PaddingSpec, TitleSpec};
use crate::style::StyleOverrides;

// @const: Newest request format understood by this build
pub const REQUEST_VERSION: u32 = 1;

fn default_version() -> u32 {
    REQUEST_VERSION
}

fn default_language() -> String {
    "auto".to_string()
}

/// Where the captions of a request come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CaptionSource {
    /// Transcribe the audio and caption it as heard
    #[default]
    Transcribe,
    /// Authoritative script timed against the transcript
    ///
    /// When `srt` is given its timings replace the speech transcription.
    Script {
        text: String,
        #[serde(default)]
        srt: Option<String>,
    },
    /// Ready-made SRT captions
    Srt { content: String },
    /// Ready-made ASS document, rendered untouched
    Ass { content: String },
    /// No captions, padding and title only
    None,
}

impl CaptionSource {
    /// Caption text known up front, used to detect the script of the captions
    ///
    /// SRT counters and timing lines are left out.
    pub fn sample_text(&self) -> Option<String> {
        match self {
            Self::Script { text, .. } => Some(text.clone()),
            Self::Srt { content } => Some(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.contains("-->") && !l.chars().all(|c| c.is_ascii_digit()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        }
    }

    pub fn needs_transcription(&self) -> bool {
        matches!(self, Self::Transcribe | Self::Script { srt: None, .. })
    }
}

/// A request to caption one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeRequest {
    // @field: Request format version
    #[serde(default = "default_version")]
    pub version: u32,

    // @field: Caller-chosen identifier, echoed in logs
    #[serde(default)]
    pub id: Option<String>,

    // @field: Local path, file:// or http(s) URL of the source video
    #[serde(alias = "video_url")]
    pub video: String,

    #[serde(default)]
    pub captions: CaptionSource,

    // @field: ISO 639 code or "auto"
    #[serde(default = "default_language")]
    pub language: String,

    // @field: Style preset name; empty selects the default preset
    #[serde(default)]
    pub preset: String,

    #[serde(default, alias = "settings")]
    pub style: StyleOverrides,

    #[serde(default)]
    pub padding: Option<PaddingSpec>,

    #[serde(default)]
    pub title: Option<TitleSpec>,

    // @field: Literal substitutions applied to caption text in order
    #[serde(default, alias = "replace")]
    pub replacements: Vec<Replacement>,

    // @field: Captions ending before this time (seconds) are dropped
    #[serde(default)]
    pub min_start: f64,

    // @field: Output mode; the configured default when absent
    #[serde(default)]
    pub mode: Option<OutputMode>,

    // @field: File name of the rendered video
    #[serde(default)]
    pub output_name: Option<String>,
}

impl ComposeRequest {
    /// Request for a video with every other field at its default
    pub fn new(video: impl Into<String>) -> Self {
        Self {
            version: REQUEST_VERSION,
            id: None,
            video: video.into(),
            captions: CaptionSource::default(),
            language: default_language(),
            preset: String::new(),
            style: StyleOverrides::default(),
            padding: None,
            title: None,
            replacements: Vec::new(),
            min_start: 0.0,
            mode: None,
            output_name: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse compose request")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid request file: {}", path.display()))
    }

    /// Label used in logs
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.video)
    }

    /// Check the request before any work is done
    // @validates: version, video reference, language, timing, caption text, replacements
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > REQUEST_VERSION {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                reason: format!("unsupported request version {} (newest is {})", self.version, REQUEST_VERSION),
            });
        }
        if self.video.trim().is_empty() {
            return Err(ConfigError::MissingField("video".to_string()));
        }
        if !is_auto(&self.language) && normalize_to_part2t(&self.language).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "language".to_string(),
                reason: format!("unknown language code '{}'", self.language),
            });
        }
        if !self.min_start.is_finite() || self.min_start < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "min_start".to_string(),
                reason: "must be a non-negative number of seconds".to_string(),
            });
        }
        match &self.captions {
            CaptionSource::Script { text, .. } if text.trim().is_empty() => {
                return Err(ConfigError::MissingField("captions.text".to_string()));
            }
            CaptionSource::Srt { content } | CaptionSource::Ass { content } if content.trim().is_empty() => {
                return Err(ConfigError::MissingField("captions.content".to_string()));
            }
            _ => {}
        }
        if self.replacements.iter().any(|r| r.find.is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "replacements".to_string(),
                reason: "find text must not be empty".to_string(),
            });
        }
        if let Some(name) = &self.output_name {
            if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
                return Err(ConfigError::InvalidValue {
                    field: "output_name".to_string(),
                    reason: format!("'{}' is not a plain file name", name),
                });
            }
        }
        Ok(())
    }
}
