/*!
 * External collaborators of the captioning pipeline.
 *
 * The pipeline only talks to these traits:
 * - Transcriber: speech-to-text service returning timed segments
 * - Renderer: video compositing tool consuming a filter graph
 * - Storage: publishes outputs and fetches inputs
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use crate::errors::{RenderError, StorageError, TranscriptionError};
use crate::subtitle_processor::TranscriptSegment;

pub mod ffmpeg;
pub mod openai;
pub mod storage;

/// Speech recognition service
#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    /// Transcribe the audio of a media file into ordered segments
    ///
    /// # Arguments
    /// * `media` - Local audio or video file
    /// * `language_hint` - ISO language code or `auto`
    async fn transcribe(&self, media: &Path, language_hint: &str) -> Result<Vec<TranscriptSegment>, TranscriptionError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// One render invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    /// Source video, input 0 of the filter graph
    pub input: PathBuf,
    /// Background image, input 1 of the filter graph
    pub background: Option<PathBuf>,
    /// Complete filter graph ending in `[vout]`
    pub filter_complex: String,
    pub output: PathBuf,
}

/// Video compositing tool
#[async_trait]
pub trait Renderer: Send + Sync + Debug {
    /// Width and height of the first video stream
    async fn probe(&self, media: &Path) -> Result<(u32, u32), RenderError>;

    /// Render the job and return the path of the produced file
    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError>;
}

/// Publishes outputs and fetches inputs
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Publish a local file and return its reference
    async fn upload(&self, local: &Path) -> Result<String, StorageError>;

    /// Make a reference available as a local file inside `work_dir`
    async fn download(&self, reference: &str, work_dir: &Path) -> Result<PathBuf, StorageError>;
}
