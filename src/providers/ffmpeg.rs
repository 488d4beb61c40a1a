use async_trait::async_trait;
use log::{debug, error, info};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

use crate::app_config::RendererConfig;
use crate::errors::RenderError;
use crate::filter_graph::OUTPUT_LABEL;

use super::{RenderJob, Renderer};

/// Probe budget; probing reads only the container header
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Renderer driving the ffmpeg command line tools
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    config: RendererConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Arguments of the ffmpeg invocation for a job
    pub fn build_args(&self, job: &RenderJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-i".into(),
            job.input.to_string_lossy().into_owned(),
        ];
        if let Some(background) = &job.background {
            args.extend(["-loop".into(), "1".into(), "-i".into(), background.to_string_lossy().into_owned()]);
        }
        args.extend([
            "-filter_complex".into(),
            job.filter_complex.clone(),
            "-map".into(),
            format!("[{}]", OUTPUT_LABEL),
            "-map".into(),
            "0:a?".into(),
            "-c:v".into(),
            self.config.video_codec.clone(),
            "-c:a".into(),
            self.config.audio_codec.clone(),
            "-movflags".into(),
            "+faststart".into(),
            job.output.to_string_lossy().into_owned(),
        ]);
        args
    }
}

/// Keep only the stderr lines that explain a failure
///
/// Strips the version banner, build configuration, stream metadata and
/// progress lines.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    const NOISE: [&str; 18] = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "title",
        "encoder",
        "handler_name",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
        "Side data:",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !NOISE.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}

/// Width and height of the first stream in ffprobe JSON output
pub fn parse_probe_output(stdout: &str) -> Result<(u32, u32), RenderError> {
    let json: Value = serde_json::from_str(stdout)
        .map_err(|e| RenderError::Probe(format!("invalid ffprobe output: {}", e)))?;

    let stream = json
        .get("streams")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .ok_or_else(|| RenderError::Probe("no video stream found".to_string()))?;

    let dimension = |key: &str| {
        stream
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .ok_or_else(|| RenderError::Probe(format!("missing {} in ffprobe output", key)))
    };
    Ok((dimension("width")?, dimension("height")?))
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn probe(&self, media: &Path) -> Result<(u32, u32), RenderError> {
        if !media.exists() {
            return Err(RenderError::MissingInput(media.display().to_string()));
        }

        let ffprobe_future = Command::new(&self.config.ffprobe_path)
            .args(["-v", "error", "-select_streams", "v:0", "-show_entries", "stream=width,height", "-of", "json"])
            .arg(media)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = ffprobe_future => {
                result.map_err(|e| RenderError::Spawn(format!("{}: {}", self.config.ffprobe_path, e)))?
            },
            _ = tokio::time::sleep(PROBE_TIMEOUT) => {
                return Err(RenderError::Timeout(PROBE_TIMEOUT));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe failed: {}", stderr.trim());
            return Err(RenderError::Probe(stderr.trim().to_string()));
        }

        let dims = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!("Probed {:?}: {}x{}", media, dims.0, dims.1);
        Ok(dims)
    }

    async fn render(&self, job: &RenderJob) -> Result<PathBuf, RenderError> {
        if !job.input.exists() {
            return Err(RenderError::MissingInput(job.input.display().to_string()));
        }
        if let Some(background) = job.background.as_ref().filter(|b| !b.exists()) {
            return Err(RenderError::MissingInput(background.display().to_string()));
        }

        let args = self.build_args(job);
        debug!("Running {} {}", self.config.ffmpeg_path, args.join(" "));

        let ffmpeg_future = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let timeout = self.timeout();
        let output = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| RenderError::Spawn(format!("{}: {}", self.config.ffmpeg_path, e)))?
            },
            _ = tokio::time::sleep(timeout) => {
                error!("ffmpeg timed out after {:?} rendering {:?}", timeout, job.output);
                return Err(RenderError::Timeout(timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let filtered = filter_ffmpeg_stderr(&stderr);
            error!("Render failed: {}", filtered);
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: filtered,
            });
        }

        info!("Rendered {:?}", job.output);
        Ok(job.output.clone())
    }
}
