/*!
 * Error types for the capforge library.
 *
 * Every component reports failures through its own enum. The enums only
 * carry owned strings so that a failure can be cloned and handed to every
 * caller coalesced on the same cache fingerprint.
 */

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while resolving styles, presets, colours or requests
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The requested style preset does not exist
    #[error("Unknown style preset: {0}")]
    UnknownPreset(String),

    /// A colour value could not be parsed
    #[error("Invalid color for {field}: '{value}'")]
    InvalidColor {
        /// Name of the style field
        field: String,
        /// Raw value supplied by the caller
        value: String,
    },

    /// A field holds a value outside its allowed range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Errors raised by the padding layout engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// A padding side is negative
    #[error("Padding {side} must not be negative (got {value})")]
    NegativePadding {
        /// Which side (top, bottom, left, right)
        side: &'static str,
        /// Offending value
        value: i64,
    },

    /// The canvas would have no area
    #[error("Invalid canvas dimensions {width}x{height}")]
    InvalidCanvas {
        /// Computed width
        width: i64,
        /// Computed height
        height: i64,
    },

    /// A style parameter for the padding background is unusable
    #[error("Invalid padding parameter: {0}")]
    InvalidParameter(String),
}

/// Errors raised while aligning a script against a transcript
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    /// The script contains no usable text
    #[error("Script text is empty")]
    EmptyScript,

    /// The transcript has no segments
    #[error("Transcript contains no segments")]
    EmptyTranscript,

    /// The best alignment is too weak to trust
    #[error("Script does not match the audio (similarity {score:.2} below {threshold:.2})")]
    LowSimilarity {
        /// Achieved weighted similarity
        score: f64,
        /// Configured viability threshold
        threshold: f64,
    },
}

/// Errors reported by the speech transcription collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscriptionError {
    /// The request could not be sent
    #[error("Transcription request failed: {0}")]
    RequestFailed(String),

    /// The service answered with an error status
    #[error("Transcription service responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error body returned by the service
        message: String,
    },

    /// The response body was not understood
    #[error("Failed to parse transcription response: {0}")]
    ParseError(String),

    /// The service is not configured
    #[error("Transcription service not configured: {0}")]
    NotConfigured(String),
}

/// Errors reported by the video renderer collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The renderer process could not be started
    #[error("Failed to start renderer: {0}")]
    Spawn(String),

    /// The renderer exited unsuccessfully
    #[error("Renderer failed with status {status}: {stderr}")]
    Failed {
        /// Exit status description
        status: String,
        /// Filtered stderr output
        stderr: String,
    },

    /// The renderer exceeded its time budget
    #[error("Renderer timed out after {0:?}")]
    Timeout(Duration),

    /// An input file does not exist
    #[error("Missing render input: {0}")]
    MissingInput(String),

    /// Media probing failed
    #[error("Failed to probe media: {0}")]
    Probe(String),
}

/// Errors reported by the storage collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// A local file operation failed
    #[error("Storage I/O error: {0}")]
    Io(String),

    /// The reference is neither a path nor a supported URL
    #[error("Unsupported media reference: {0}")]
    InvalidReference(String),

    /// A remote download failed
    #[error("Download failed: {0}")]
    Download(String),
}

/// Errors raised when submitting to or querying the job queue
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    /// The queue holds its maximum number of pending jobs
    #[error("Job queue is full ({0} pending jobs)")]
    Full(usize),

    /// The queue no longer accepts jobs
    #[error("Job queue is shutting down")]
    ShutDown,

    /// The request failed validation
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] ConfigError),

    /// No job with this id is known
    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

/// Coarse classification of a [`CaptionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Layout,
    Alignment,
    Transcription,
    Render,
    Storage,
    Cancelled,
    File,
}

impl ErrorKind {
    /// Whether an external scheduler may retry a job that failed with this kind
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transcription | Self::Render | Self::Storage)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Layout => "layout",
            Self::Alignment => "alignment",
            Self::Transcription => "transcription",
            Self::Render => "render",
            Self::Storage => "storage",
            Self::Cancelled => "cancelled",
            Self::File => "file",
        };
        write!(f, "{}", name)
    }
}

/// Main error type wrapping all component errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptionError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Alignment error: {0}")]
    Alignment(#[from] AlignmentError),

    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The composition was cancelled cooperatively
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),
}

impl CaptionError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Layout(_) => ErrorKind::Layout,
            Self::Alignment(_) => ErrorKind::Alignment,
            Self::Transcription(_) => ErrorKind::Transcription,
            Self::Render(_) => ErrorKind::Render,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::File(_) => ErrorKind::File,
        }
    }
}

impl From<std::io::Error> for CaptionError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<anyhow::Error> for CaptionError {
    fn from(error: anyhow::Error) -> Self {
        Self::File(format!("{:#}", error))
    }
}
