/*!
 * Common test utilities for the capforge test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use capforge::app_config::Config;
use capforge::CaptionController;

// Re-export the mock providers module
pub mod mock_providers;

use mock_providers::{MemoryStorage, MockRenderer, MockTranscriber};

/// Route library logs to the test output; repeated calls are ignored
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Three-entry SRT used as a transcript
pub fn sample_srt() -> &'static str {
    "1
00:00:01,000 --> 00:00:04,000
welcome to the channel

2
00:00:04,500 --> 00:00:08,000
today we cook green curry

3
00:00:08,500 --> 00:00:12,000
let's get started
"
}

/// Configuration whose scratch and output directories live in `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.work_dir = dir.join("work");
    config.storage.root = dir.join("published");
    config.storage.public_base_url = None;
    config
}

/// Controller wired to mocks, plus handles to inspect them
pub struct TestHarness {
    pub dir: TempDir,
    pub video: PathBuf,
    pub controller: CaptionController,
    pub transcriber: Arc<MockTranscriber>,
    pub renderer: Arc<MockRenderer>,
    pub storage: Arc<MemoryStorage>,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_renderer(MockRenderer::new(1080, 1920))
    }

    pub fn with_renderer(renderer: MockRenderer) -> Result<Self> {
        init_test_logging();
        let dir = create_temp_dir()?;
        let video = create_test_file(dir.path(), "clip.mp4", "not really a video")?;
        let transcriber = Arc::new(MockTranscriber::from_srt(sample_srt()));
        let renderer = Arc::new(renderer);
        let storage = Arc::new(MemoryStorage::default());
        let controller = CaptionController::with_collaborators(
            test_config(dir.path()),
            transcriber.clone(),
            renderer.clone(),
            storage.clone(),
        )?;
        Ok(Self {
            dir,
            video,
            controller,
            transcriber,
            renderer,
            storage,
        })
    }

    pub fn video_ref(&self) -> String {
        self.video.to_string_lossy().into_owned()
    }
}
