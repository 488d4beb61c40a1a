/*!
 * # capforge - caption composition for short videos
 *
 * Turns a video plus a caption source (speech, a script, SRT or ASS) into a
 * rendered, captioned video, optionally padded onto a larger canvas with a
 * styled title.
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `text_shaper`: width estimation, Thai-aware segmentation and line wrapping
 * - `style`: presets, overrides and language-driven style resolution
 * - `alignment`: timing an authoritative script against a transcript
 * - `composer`: cue clamping and wrapping, ASS tracks and drawtext directives
 * - `padding`: canvas padding, backgrounds and title layout
 * - `filter_graph`: ffmpeg filter graph for a layout and a subtitle layer
 * - `cache`: fingerprinted memoization with in-flight coalescing
 * - `job_queue`: priority worker pool with retries and cancellation
 * - `providers`: transcription, rendering and storage collaborators
 * - `app_controller`: the end-to-end composition pipeline
 * - `app_config`, `request`, `errors`: configuration, request format and errors
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod alignment;
pub mod app_config;
pub mod app_controller;
pub mod cache;
pub mod cancellation;
pub mod composer;
pub mod errors;
pub mod file_utils;
pub mod filter_graph;
pub mod job_queue;
pub mod language_utils;
pub mod padding;
pub mod providers;
pub mod request;
pub mod style;
pub mod subtitle_processor;
pub mod text_shaper;

// Re-export main types for easier usage
pub use alignment::ScriptAligner;
pub use app_config::{Config, OutputMode};
pub use app_controller::{CaptionController, ComposeOutcome, Diagnostics};
pub use cache::{CompositionCache, Fingerprint};
pub use cancellation::CancellationToken;
pub use composer::{SubtitleComposer, VideoGeometry};
pub use errors::{CaptionError, ErrorKind};
pub use job_queue::{JobHandler, JobPriority, JobQueue, JobStatus};
pub use padding::{PaddingLayoutEngine, PaddingSpec, TitleSpec};
pub use request::{CaptionSource, ComposeRequest};
pub use style::{Style, StyleResolver};
pub use subtitle_processor::{Cue, TranscriptSegment};
pub use text_shaper::TextShaper;
