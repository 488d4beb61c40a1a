/*!
 * Mock collaborator implementations for testing
 *
 * None of these touch the network or spawn ffmpeg. Each records how often
 * it was called so tests can check coalescing and retries.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use capforge::errors::{RenderError, StorageError, TranscriptionError};
use capforge::providers::{RenderJob, Renderer, Storage, Transcriber};
use capforge::subtitle_processor::{TranscriptSegment, parse_srt_string};

/// Transcriber returning fixed segments
#[derive(Debug, Default)]
pub struct MockTranscriber {
    segments: Vec<TranscriptSegment>,
    pub calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn from_srt(srt: &str) -> Self {
        Self {
            segments: parse_srt_string(srt).unwrap_or_default(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _media: &Path, _language_hint: &str) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.segments.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Renderer that writes a placeholder output and remembers every job
#[derive(Debug)]
pub struct MockRenderer {
    width: u32,
    height: u32,
    delay: Duration,
    /// Number of initial renders that fail with a timeout
    failures: usize,
    pub renders: AtomicUsize,
    pub jobs: Mutex<Vec<RenderJob>>,
}

impl MockRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            delay: Duration::ZERO,
            failures: 0,
            renders: AtomicUsize::new(0),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn last_job(&self) -> Option<RenderJob> {
        self.jobs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn probe(&self, _media: &Path) -> Result<(u32, u32), RenderError> {
        Ok((self.width, self.height))
    }

    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
        let attempt = self.renders.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if attempt < self.failures {
            return Err(RenderError::Timeout(Duration::from_secs(1)));
        }
        std::fs::write(&job.output, b"rendered").map_err(|e| RenderError::Spawn(e.to_string()))?;
        Ok(job.output.clone())
    }
}

/// Storage keeping uploads in memory and serving local paths as downloads
#[derive(Debug, Default)]
pub struct MemoryStorage {
    pub uploads: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(&self, local: &Path) -> Result<String, StorageError> {
        let bytes = std::fs::read(local).map_err(|e| StorageError::Io(e.to_string()))?;
        let mut uploads = self.uploads.lock().unwrap();
        let name = local.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let reference = format!("mem://{}/{}", uploads.len(), name);
        uploads.insert(reference.clone(), bytes);
        Ok(reference)
    }

    async fn download(&self, reference: &str, _work_dir: &Path) -> Result<PathBuf, StorageError> {
        let path = PathBuf::from(reference);
        if path.exists() {
            Ok(path)
        } else {
            Err(StorageError::InvalidReference(reference.to_string()))
        }
    }
}
