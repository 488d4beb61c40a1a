use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tempfile::TempDir;

use crate::alignment::ScriptAligner;
use crate::app_config::{Config, OutputMode};
use crate::cache::{self, CompositionCache, Fingerprint};
use crate::cancellation::CancellationToken;
use crate::composer::{ComposeOptions, RenderDirective, SubtitleComposer};
use crate::errors::{CaptionError, RenderError};
use crate::file_utils::FileManager;
use crate::filter_graph::{SubtitleLayer, build_filter_graph};
use crate::job_queue::JobHandler;
use crate::padding::PaddingLayoutEngine;
use crate::providers::ffmpeg::FfmpegRenderer;
use crate::providers::openai::OpenAiTranscriber;
use crate::providers::storage::LocalStorage;
use crate::providers::{RenderJob, Renderer, Storage, Transcriber};
use crate::request::{CaptionSource, ComposeRequest};
use crate::style::{Style, StyleResolver};
use crate::subtitle_processor::{self, Cue, TranscriptSegment};
use crate::text_shaper::TextShaper;

// @module: Entry point composing a captioned video from a request

/// What happened while composing, for callers and logs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub fingerprint: String,
    /// The result came from the cache or from a coalesced computation
    pub cache_hit: bool,
    pub mode: OutputMode,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub segment_count: usize,
    pub cue_count: usize,
    /// Weighted similarity of the script alignment, when a script was aligned
    pub alignment_score: Option<f64>,
    pub title_font_size: Option<u32>,
    pub thai: bool,
    pub segmenter: String,
    pub elapsed_ms: u64,
}

/// Result of [`CaptionController::compose_captioned_video`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeOutcome {
    /// Storage reference of the rendered video
    pub output_ref: String,
    /// Final wrapped cues
    pub cues: Vec<Cue>,
    pub diagnostics: Diagnostics,
}

/// Owns the pipeline components and the external collaborators
#[derive(Clone)]
pub struct CaptionController {
    // @field: App configuration
    config: Arc<Config>,
    resolver: Arc<StyleResolver>,
    aligner: Arc<ScriptAligner>,
    composer: Arc<SubtitleComposer>,
    layout_engine: Arc<PaddingLayoutEngine>,
    cache: CompositionCache<ComposeOutcome>,
    transcriber: Arc<dyn Transcriber>,
    renderer: Arc<dyn Renderer>,
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for CaptionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionController")
            .field("transcriber", &self.transcriber.name())
            .field("renderer", &self.renderer)
            .field("storage", &self.storage)
            .finish()
    }
}

impl CaptionController {
    // @method: Controller with the default collaborators (OpenAI, ffmpeg, local storage)
    pub fn with_config(config: Config) -> Result<Self> {
        let transcriber = Arc::new(OpenAiTranscriber::new(&config.transcription));
        let renderer = Arc::new(FfmpegRenderer::new(config.renderer.clone()));
        let storage = Arc::new(LocalStorage::new(&config.storage));
        Self::with_collaborators(config, transcriber, renderer, storage)
    }

    /// Controller with caller-supplied collaborators
    pub fn with_collaborators(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        renderer: Arc<dyn Renderer>,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let shaper = TextShaper::from_config(config.shaping.clone())
            .context("Failed to initialize the text shaper")?;

        Ok(Self {
            resolver: Arc::new(StyleResolver::default()),
            aligner: Arc::new(ScriptAligner::new(config.alignment.clone())),
            composer: Arc::new(SubtitleComposer::new(shaper.clone(), config.composer.clone())),
            layout_engine: Arc::new(PaddingLayoutEngine::new(shaper)),
            cache: CompositionCache::new(
                std::time::Duration::from_secs(config.cache.ttl_secs),
                config.cache.enabled,
            ),
            config: Arc::new(config),
            transcriber,
            renderer,
            storage,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &CompositionCache<ComposeOutcome> {
        &self.cache
    }

    pub fn shaper(&self) -> &TextShaper {
        self.composer.shaper()
    }

    /// Resolve the style of a request
    ///
    /// An `auto` language becomes Thai when the known caption text is
    /// majority Thai, so that the Thai style defaults apply.
    pub fn resolve_style(&self, request: &ComposeRequest) -> Result<Style, CaptionError> {
        let mut overrides = request.style.clone();
        if overrides.language.is_none() {
            let mut language = request.language.clone();
            if crate::language_utils::is_auto(&language) {
                if let Some(text) = request.captions.sample_text() {
                    if self.shaper().is_thai(&text, &language) {
                        debug!("Caption text is Thai, using Thai style defaults");
                        language = "th".to_string();
                    }
                }
            }
            overrides.language = Some(language);
        }
        Ok(self.resolver.resolve(&request.preset, &overrides)?)
    }

    /// Compose, render and publish a captioned video
    ///
    /// Identical requests on identical media share one computation and its
    /// cached result. Nothing is cached unless every step succeeded.
    pub async fn compose_captioned_video(
        &self,
        request: ComposeRequest,
        token: CancellationToken,
    ) -> Result<ComposeOutcome, CaptionError> {
        let started = Instant::now();
        request.validate()?;
        token.checkpoint()?;
        info!("Composing captions for {}", request.label());

        let style = self.resolve_style(&request)?;

        FileManager::ensure_dir(&self.config.work_dir)?;
        let job_dir = Arc::new(
            tempfile::Builder::new()
                .prefix("job-")
                .tempdir_in(&self.config.work_dir)
                .context("Failed to create job directory")?,
        );

        let video = self.storage.download(&request.video, job_dir.path()).await?;
        token.checkpoint()?;

        let media_hash = cache::hash_file(&video).await?;
        let fingerprint = Fingerprint::compute(
            &media_hash,
            &Self::request_text_key(&request, self.mode_of(&request)),
            &style,
            request.padding.as_ref(),
        );
        debug!("Request {} has fingerprint {}", request.label(), fingerprint);

        // set only when this call runs the pipeline itself
        let computed = Arc::new(AtomicBool::new(false));
        let controller = self.clone();
        let computed_flag = Arc::clone(&computed);
        let fingerprint_hex = fingerprint.as_str().to_string();
        // the pipeline runs under the cache's own token; `token` only stops this caller
        let mut outcome = self
            .cache
            .get_or_compute(&fingerprint, &token, move |work_token| {
                computed_flag.store(true, Ordering::SeqCst);
                async move {
                    controller
                        .run_pipeline(request, style, video, job_dir, fingerprint_hex, work_token)
                        .await
                }
            })
            .await?;

        outcome.diagnostics.cache_hit = !computed.load(Ordering::SeqCst);
        if outcome.diagnostics.cache_hit {
            outcome.diagnostics.elapsed_ms = started.elapsed().as_millis() as u64;
            info!("Served {} from cache", outcome.output_ref);
        }
        Ok(outcome)
    }

    fn mode_of(&self, request: &ComposeRequest) -> OutputMode {
        request.mode.unwrap_or(self.config.composer.default_mode)
    }

    /// Canonical text part of the fingerprint: everything besides media, style and padding
    fn request_text_key(request: &ComposeRequest, mode: OutputMode) -> String {
        serde_json::json!({
            "captions": request.captions,
            "language": request.language,
            "title": request.title,
            "replacements": request.replacements,
            "min_start": request.min_start,
            "mode": mode,
            "output_name": request.output_name,
        })
        .to_string()
    }

    async fn run_pipeline(
        &self,
        request: ComposeRequest,
        style: Style,
        video: PathBuf,
        job_dir: Arc<TempDir>,
        fingerprint: String,
        token: CancellationToken,
    ) -> Result<ComposeOutcome, CaptionError> {
        let started = Instant::now();
        let mode = self.mode_of(&request);

        let (width, height) = self.renderer.probe(&video).await?;
        token.checkpoint()?;

        let padding = request.padding.clone().unwrap_or_default();
        let layout = self
            .layout_engine
            .layout(&padding, width, height, request.title.as_ref())?;
        let geometry = layout.geometry();

        let (raw_cues, segment_count, alignment_score) = self.caption_cues(&request, &video, &token).await?;
        token.checkpoint()?;

        let (cues, layer) = match &request.captions {
            CaptionSource::Ass { content } => {
                let path = job_dir.path().join("captions.ass");
                FileManager::write_to_file(&path, content)?;
                (Vec::new(), self.ass_layer(path))
            }
            CaptionSource::None => (Vec::new(), SubtitleLayer::None),
            _ => {
                let options = ComposeOptions {
                    mode,
                    min_start: request.min_start,
                    replacements: request.replacements.clone(),
                };
                let composition = self.composer.compose(&raw_cues, &style, &geometry, &options, &token)?;
                let layer = match composition.directive {
                    RenderDirective::SubtitleTrack { ass } => {
                        let path = job_dir.path().join("captions.ass");
                        FileManager::write_to_file(&path, &ass)?;
                        self.ass_layer(path)
                    }
                    RenderDirective::BurnIn { filters } => SubtitleLayer::DrawText(filters),
                };
                (composition.cues, layer)
            }
        };

        let graph = build_filter_graph(&layout, &layer);
        let background = match &graph.background_input {
            Some(source) => Some(self.storage.download(source, job_dir.path()).await?),
            None => None,
        };

        let output_name = request
            .output_name
            .clone()
            .unwrap_or_else(|| FileManager::output_name_for(&video, "captioned"));
        let job = RenderJob {
            input: video.clone(),
            background,
            filter_complex: graph.filter_complex,
            output: job_dir.path().join(output_name),
        };

        token.checkpoint()?;
        let rendered = tokio::select! {
            result = self.renderer.render(&job) => result?,
            err = token.cancelled() => return Err(err),
        };
        if !rendered.exists() {
            return Err(RenderError::MissingInput(format!("renderer produced no file at {:?}", rendered)).into());
        }

        let output_ref = self.storage.upload(&rendered).await?;
        info!("Published {} ({} cues)", output_ref, cues.len());

        Ok(ComposeOutcome {
            output_ref,
            diagnostics: Diagnostics {
                fingerprint,
                cache_hit: false,
                mode,
                canvas_width: layout.canvas_width,
                canvas_height: layout.canvas_height,
                segment_count,
                cue_count: cues.len(),
                alignment_score,
                title_font_size: layout.title_font_size,
                thai: style.is_thai(),
                segmenter: self.shaper().segmenter_name().to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
            cues,
        })
    }

    fn ass_layer(&self, path: PathBuf) -> SubtitleLayer {
        SubtitleLayer::AssTrack {
            path,
            fonts_dir: self.config.renderer.fonts_dir.clone(),
        }
    }

    /// Raw timed cues of the caption source, with segment count and alignment score
    async fn caption_cues(
        &self,
        request: &ComposeRequest,
        video: &Path,
        token: &CancellationToken,
    ) -> Result<(Vec<Cue>, usize, Option<f64>), CaptionError> {
        match &request.captions {
            CaptionSource::Transcribe => {
                let segments = self.transcribe(video, &request.language, token).await?;
                let cues = segments.iter().map(|s| Cue::raw(s.start, s.end, s.text.clone())).collect();
                Ok((cues, segments.len(), None))
            }
            CaptionSource::Script { text, srt } => {
                let segments = match srt {
                    Some(content) => parse_srt(content)?,
                    None => self.transcribe(video, &request.language, token).await?,
                };
                token.checkpoint()?;
                let result = self.aligner.align_detailed(&segments, text, request.min_start)?;
                Ok((result.cues, segments.len(), Some(result.score)))
            }
            CaptionSource::Srt { content } => {
                let segments = parse_srt(content)?;
                let cues = segments.iter().map(|s| Cue::raw(s.start, s.end, s.text.clone())).collect();
                Ok((cues, segments.len(), None))
            }
            CaptionSource::Ass { .. } | CaptionSource::None => Ok((Vec::new(), 0, None)),
        }
    }

    async fn transcribe(
        &self,
        video: &Path,
        language: &str,
        token: &CancellationToken,
    ) -> Result<Vec<TranscriptSegment>, CaptionError> {
        info!("Transcribing {:?} with {}", video, self.transcriber.name());
        let segments = tokio::select! {
            result = self.transcriber.transcribe(video, language) => result?,
            err = token.cancelled() => return Err(err),
        };
        if segments.is_empty() {
            warn!("Transcription of {:?} returned no speech", video);
        }
        Ok(segments)
    }
}

fn parse_srt(content: &str) -> Result<Vec<TranscriptSegment>, CaptionError> {
    subtitle_processor::parse_srt_string(content).map_err(|e| {
        CaptionError::Config(crate::errors::ConfigError::InvalidValue {
            field: "captions.srt".to_string(),
            reason: format!("{:#}", e),
        })
    })
}

#[async_trait::async_trait]
impl JobHandler for CaptionController {
    type Output = ComposeOutcome;

    async fn handle(&self, request: ComposeRequest, token: CancellationToken) -> Result<ComposeOutcome, CaptionError> {
        self.compose_captioned_video(request, token).await
    }
}
