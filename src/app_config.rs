use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default language hint ("auto", "th", "en", ...)
    #[serde(default = "default_language")]
    pub language: String,

    /// Text shaping tables and factors
    #[serde(default)]
    pub shaping: ShapingConfig,

    /// Script alignment settings
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Subtitle composition settings
    #[serde(default)]
    pub composer: ComposerConfig,

    /// Composition cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// External renderer settings
    #[serde(default)]
    pub renderer: RendererConfig,

    /// Speech transcription service settings
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Output storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Job queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Scratch directory for intermediate files
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Constants used by the text shaper
///
/// Width estimation is character based, so every factor here is a tunable
/// approximation rather than a font metric.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShapingConfig {
    /// Share of the available width that text may occupy
    #[serde(default = "default_width_fill_ratio")]
    pub width_fill_ratio: f64,

    /// Average glyph width of Latin text relative to the font size
    #[serde(default = "default_latin_char_width")]
    pub latin_char_width: f64,

    /// Average glyph width of Thai text relative to the font size
    #[serde(default = "default_thai_char_width")]
    pub thai_char_width: f64,

    /// Line height relative to the font size
    #[serde(default = "default_line_height_factor")]
    pub line_height_factor: f64,

    /// Share of Thai code points above which text is treated as Thai
    #[serde(default = "default_thai_majority_ratio")]
    pub thai_majority_ratio: f64,

    /// Texts shorter than this (in display cells) are never split by `shape_lines`
    #[serde(default = "default_min_split_chars")]
    pub min_split_chars: usize,

    /// How far (in display cells) a chunk boundary may move to avoid cutting a particle
    #[serde(default = "default_particle_nudge")]
    pub particle_nudge: usize,

    /// Conjunctions and prepositions that make good line starts
    #[serde(default = "default_closing_words")]
    pub closing_words: Vec<String>,

    /// Thai particles a line may start with
    #[serde(default = "default_thai_prefix_particles")]
    pub thai_prefix_particles: Vec<String>,

    /// Thai particles a line may end with
    #[serde(default = "default_thai_suffix_particles")]
    pub thai_suffix_particles: Vec<String>,

    /// Word list (one word per line) enabling dictionary segmentation of Thai
    #[serde(default)]
    pub thai_dictionary: Option<PathBuf>,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            width_fill_ratio: default_width_fill_ratio(),
            latin_char_width: default_latin_char_width(),
            thai_char_width: default_thai_char_width(),
            line_height_factor: default_line_height_factor(),
            thai_majority_ratio: default_thai_majority_ratio(),
            min_split_chars: default_min_split_chars(),
            particle_nudge: default_particle_nudge(),
            closing_words: default_closing_words(),
            thai_prefix_particles: default_thai_prefix_particles(),
            thai_suffix_particles: default_thai_suffix_particles(),
            thai_dictionary: None,
        }
    }
}

/// Script alignment settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AlignmentConfig {
    /// Minimum weighted similarity for an alignment to be accepted (0.0-1.0)
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Largest number of units merged into one group
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,

    /// Shortest cue the aligner will emit, in seconds
    #[serde(default = "default_min_cue_duration")]
    pub min_cue_duration: f64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            min_similarity: default_min_similarity(),
            max_group_size: default_max_group_size(),
            min_cue_duration: default_min_cue_duration(),
        }
    }
}

/// How composed subtitles reach the renderer
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// A styled subtitle track rendered by the `ass` filter
    #[default]
    Track,
    /// One drawtext directive per line
    BurnIn,
}

/// Subtitle composition settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ComposerConfig {
    /// Allowed overlap between consecutive cues, in seconds
    #[serde(default)]
    pub overlap_epsilon: f64,

    /// Shortest cue kept after clamping, in seconds
    #[serde(default = "default_min_cue_duration")]
    pub min_cue_duration: f64,

    /// Output mode used when a request does not choose one
    #[serde(default)]
    pub default_mode: OutputMode,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            overlap_epsilon: 0.0,
            min_cue_duration: default_min_cue_duration(),
            default_mode: OutputMode::default(),
        }
    }
}

/// Composition cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CacheConfig {
    /// Whether finished compositions are memoized
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of a cache entry in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval of the background sweep in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// External renderer settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RendererConfig {
    /// ffmpeg executable
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe executable
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Render timeout in seconds
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,

    /// Video codec for the output
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Audio codec for the output
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Directory containing font files, passed to the subtitle filter
    #[serde(default)]
    pub fonts_dir: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_render_timeout_secs(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            fonts_dir: None,
        }
    }
}

/// Speech transcription service settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranscriptionConfig {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    /// API key; empty means read OPENAI_API_KEY
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_transcription_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            api_key: String::new(),
            model: default_transcription_model(),
            timeout_secs: default_transcription_timeout_secs(),
        }
    }
}

impl TranscriptionConfig {
    /// API key from the config, or from the environment
    pub fn resolved_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        std::env::var("OPENAI_API_KEY").unwrap_or_default()
    }
}

/// Output storage settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    /// Directory receiving uploaded outputs
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Public URL prefix under which `root` is served
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: None,
        }
    }
}

/// Job queue settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueueConfig {
    /// Number of concurrent workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Maximum number of queued jobs
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Retries for jobs failing with a retryable error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Time budget of one job attempt in seconds
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_queue_size: default_max_queue_size(),
            max_retries: default_max_retries(),
            job_timeout_secs: default_job_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_width_fill_ratio() -> f64 {
    0.8
}

fn default_latin_char_width() -> f64 {
    0.55
}

fn default_thai_char_width() -> f64 {
    0.6
}

fn default_line_height_factor() -> f64 {
    1.2
}

fn default_thai_majority_ratio() -> f64 {
    0.5
}

fn default_min_split_chars() -> usize {
    10
}

fn default_particle_nudge() -> usize {
    10
}

fn default_closing_words() -> Vec<String> {
    [
        "and", "or", "but", "nor", "so", "yet", "with", "without", "for", "to", "of", "in", "on",
        "at", "by", "from", "into", "about", "than", "that", "which", "while", "because", "when",
        "&",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

fn default_thai_prefix_particles() -> Vec<String> {
    [
        "และ", "หรือ", "แต่", "เพราะ", "ซึ่ง", "เพื่อ", "โดย", "ถ้า", "เมื่อ", "การ", "ความ", "ที่",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

fn default_thai_suffix_particles() -> Vec<String> {
    ["ค่ะ", "นะคะ", "แล้ว", "ด้วย", "เลย", "ไหม", "กัน"]
        .iter()
        .map(|w| w.to_string())
        .collect()
}

fn default_min_similarity() -> f64 {
    0.35
}

fn default_max_group_size() -> usize {
    8
}

fn default_min_cue_duration() -> f64 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_render_timeout_secs() -> u64 {
    1800
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "copy".to_string()
}

fn default_transcription_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_transcription_timeout_secs() -> u64 {
    600
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("capforge")
        .join("outputs")
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("capforge")
}

fn default_workers() -> usize {
    4
}

fn default_max_queue_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_job_timeout_secs() -> u64 {
    1800
}

impl Config {
    /// Load a configuration file, or create one with defaults if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shaping = &self.shaping;
        for (field, value) in [
            ("shaping.width_fill_ratio", shaping.width_fill_ratio),
            ("shaping.latin_char_width", shaping.latin_char_width),
            ("shaping.thai_char_width", shaping.thai_char_width),
            ("shaping.line_height_factor", shaping.line_height_factor),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: format!("must be positive, got {}", value),
                });
            }
        }

        if !(0.0..=1.0).contains(&shaping.thai_majority_ratio) {
            return Err(ConfigError::InvalidValue {
                field: "shaping.thai_majority_ratio".to_string(),
                reason: "must be within 0.0..=1.0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.alignment.min_similarity) {
            return Err(ConfigError::InvalidValue {
                field: "alignment.min_similarity".to_string(),
                reason: "must be within 0.0..=1.0".to_string(),
            });
        }

        if self.alignment.max_group_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "alignment.max_group_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.composer.overlap_epsilon < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "composer.overlap_epsilon".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_secs".to_string(),
                reason: "must be at least 1 second".to_string(),
            });
        }

        if self.queue.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue.workers".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }

        Ok(())
    }

    /// Validate the language hint against ISO 639 codes
    pub fn validate_language(&self) -> Result<()> {
        if crate::language_utils::is_auto(&self.language) {
            return Ok(());
        }
        crate::language_utils::get_language_name(&self.language)
            .map(|_| ())
            .map_err(|e| anyhow!("Invalid default language '{}': {}", self.language, e))
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            language: default_language(),
            shaping: ShapingConfig::default(),
            alignment: AlignmentConfig::default(),
            composer: ComposerConfig::default(),
            cache: CacheConfig::default(),
            renderer: RendererConfig::default(),
            transcription: TranscriptionConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            work_dir: default_work_dir(),
            log_level: LogLevel::default(),
        }
    }
}
