use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::app_config::TranscriptionConfig;
use crate::errors::TranscriptionError;
use crate::language_utils;
use crate::subtitle_processor::TranscriptSegment;

use super::Transcriber;

/// Client for OpenAI-compatible `/audio/transcriptions` endpoints
#[derive(Debug)]
pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

/// One segment of a `verbose_json` transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// `verbose_json` transcription response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerboseTranscription {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<VerboseSegment>,
}

impl VerboseTranscription {
    /// Segments with text, in start order
    ///
    /// Empty segments are dropped. A whole-text response without segments
    /// becomes a single segment spanning the reported duration.
    pub fn into_segments(self) -> Vec<TranscriptSegment> {
        let mut segments: Vec<TranscriptSegment> = self
            .segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty() && s.end > s.start)
            .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim()))
            .collect();

        if segments.is_empty() {
            if let Some(duration) = self.duration.filter(|d| *d > 0.0) {
                if !self.text.trim().is_empty() {
                    segments.push(TranscriptSegment::new(0.0, duration, self.text.trim()));
                }
            }
        }

        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        segments
    }
}

impl OpenAiTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.resolved_api_key(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/audio/transcriptions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, media: &Path, language_hint: &str) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        if self.api_key.is_empty() {
            return Err(TranscriptionError::NotConfigured(
                "no API key set (config or OPENAI_API_KEY)".to_string(),
            ));
        }

        let bytes = tokio::fs::read(media)
            .await
            .map_err(|e| TranscriptionError::RequestFailed(format!("cannot read {:?}: {}", media, e)))?;
        let file_name = media
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = language_utils::to_part1(language_hint) {
            form = form.text("language", language);
        }

        debug!("Transcribing {:?} with {}", media, self.model);
        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Transcription API error ({}): {}", status, message);
            return Err(TranscriptionError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body = response
            .json::<VerboseTranscription>()
            .await
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

        let segments = body.into_segments();
        info!("Transcribed {:?} into {} segments", media, segments.len());
        Ok(segments)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
