#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use capforge::app_config::{self, Config};
use capforge::file_utils::{FileManager, FileType};
use capforge::job_queue::{JobPriority, JobQueue, JobStatus};
use capforge::subtitle_processor::{self, parse_srt_string};
use capforge::{CancellationToken, CaptionController, ComposeRequest, OutputMode, ScriptAligner, TextShaper};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for OutputMode to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputMode {
    Track,
    BurnIn,
}

impl From<CliOutputMode> for OutputMode {
    fn from(mode: CliOutputMode) -> Self {
        match mode {
            CliOutputMode::Track => OutputMode::Track,
            CliOutputMode::BurnIn => OutputMode::BurnIn,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compose one captioned video from a request file
    Compose {
        /// Compose request (JSON)
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Override the output mode of the request
        #[arg(short, long, value_enum)]
        mode: Option<CliOutputMode>,
    },

    /// Compose every request file of a directory through the job queue
    Batch {
        /// Directory searched recursively for *.json requests
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Number of workers, overriding the configuration
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show how a caption text is wrapped
    Shape {
        text: String,

        /// Width available to the text in pixels
        #[arg(long, default_value_t = 1080.0)]
        width: f64,

        /// Height available to the text in pixels
        #[arg(long, default_value_t = 400.0)]
        height: f64,

        #[arg(long, default_value_t = 48.0)]
        font_size: f64,

        /// Language hint ("auto", "th", "en", ...)
        #[arg(short, long, default_value = "auto")]
        language: String,
    },

    /// Time a script against an SRT transcript and print the resulting SRT
    Align {
        /// Script text file
        #[arg(long)]
        script: PathBuf,

        /// SRT file providing the timings
        #[arg(long)]
        srt: PathBuf,

        /// Drop captions ending before this time (seconds)
        #[arg(long, default_value_t = 0.0)]
        min_start: f64,

        /// Write the SRT here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions for capforge
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// capforge - caption composition for short videos
///
/// Transcribes or aligns captions, lays them out for Latin and Thai text,
/// pads the video onto a styled canvas and renders it with ffmpeg.
#[derive(Parser, Debug)]
#[command(name = "capforge")]
#[command(version)]
#[command(about = "Captioned video composition tool")]
#[command(long_about = "capforge turns a video and a caption source into a rendered, captioned video.

EXAMPLES:
    capforge compose request.json               # Compose one video
    capforge compose -m burn-in request.json    # Burn captions in with drawtext
    capforge batch requests/ -w 4               # Compose a directory of requests
    capforge shape \"สวัสดีครับ ยินดีต้อนรับ\"        # Preview line wrapping
    capforge align --script s.txt --srt t.srt   # Time a script against a transcript
    capforge completions bash > capforge.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in capforge.json by default. If the config file doesn't
    exist, a default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "capforge.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour,
                now,
                tag,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;
    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "capforge", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    log::set_max_level(level_filter(&config.log_level));
    config.validate().context("Configuration validation failed")?;
    if let Err(e) = config.validate_language() {
        warn!("{}", e);
    }

    match cli.command {
        Commands::Compose { request, mode } => run_compose(config, request, mode).await,
        Commands::Batch { dir, workers } => run_batch(config, dir, workers).await,
        Commands::Shape {
            text,
            width,
            height,
            font_size,
            language,
        } => run_shape(&config, &text, width, height, font_size, &language),
        Commands::Align {
            script,
            srt,
            min_start,
            output,
        } => run_align(&config, script, srt, min_start, output),
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_compose(config: Config, path: PathBuf, mode: Option<CliOutputMode>) -> Result<()> {
    let mut request = ComposeRequest::from_file(&path)?;
    if let Some(mode) = mode {
        request.mode = Some(mode.into());
    }
    let controller = CaptionController::with_config(config)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling composition");
            interrupt.cancel();
        }
    });

    let outcome = controller
        .compose_captioned_video(request, token)
        .await
        .map_err(|e| anyhow!("Composition failed ({}): {}", e.kind(), e))?;

    info!(
        "Success: {} ({} cues, {} ms)",
        outcome.output_ref, outcome.diagnostics.cue_count, outcome.diagnostics.elapsed_ms
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_batch(mut config: Config, dir: PathBuf, workers: Option<usize>) -> Result<()> {
    if !dir.is_dir() {
        return Err(anyhow!("Input directory does not exist: {:?}", dir));
    }
    if let Some(workers) = workers {
        config.queue.workers = workers.max(1);
    }

    let files: Vec<PathBuf> = FileManager::find_files(&dir, "json")?
        .into_iter()
        .filter(|p| FileManager::detect_file_type(p) == FileType::Request)
        .collect();
    if files.is_empty() {
        warn!("No request files found in {:?}", dir);
        return Ok(());
    }
    // every request must fit the queue at once
    config.queue.max_queue_size = config.queue.max_queue_size.max(files.len());

    let controller = CaptionController::with_config(config.clone())?;
    let sweeper = controller
        .cache()
        .spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs.max(1)));
    let queue = JobQueue::start(controller, config.queue.clone());

    let mut jobs = Vec::new();
    for file in &files {
        match ComposeRequest::from_file(file) {
            Ok(request) => match queue.submit(request, JobPriority::Normal) {
                Ok(id) => jobs.push((file.clone(), id)),
                Err(e) => error!("Skipping {:?}: {}", file, e),
            },
            Err(e) => error!("Skipping {:?}: {:#}", file, e),
        }
    }
    info!("Queued {} of {} requests", jobs.len(), files.len());

    let progress = ProgressBar::new(jobs.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut failed = 0usize;
    for (file, id) in &jobs {
        let info = queue.wait(*id).await?;
        progress.inc(1);
        match info.status {
            JobStatus::Completed => {
                if let Some(outcome) = info.output {
                    progress.set_message(outcome.output_ref.clone());
                    info!("{:?} -> {}", file, outcome.output_ref);
                }
            }
            status => {
                failed += 1;
                error!(
                    "{:?} ended {:?} after {} attempt(s): {}",
                    file,
                    status,
                    info.attempts,
                    info.error.unwrap_or_default()
                );
            }
        }
    }
    progress.finish_and_clear();

    let stats = queue.stats();
    queue.shutdown().await;
    sweeper.abort();
    info!(
        "Finished: {} completed, {} failed, {} cancelled, {} retries",
        stats.completed, stats.failed, stats.cancelled, stats.retries
    );

    if failed > 0 {
        return Err(anyhow!("{} of {} jobs did not complete", failed, jobs.len()));
    }
    Ok(())
}

fn run_shape(config: &Config, text: &str, width: f64, height: f64, font_size: f64, language: &str) -> Result<()> {
    let shaper = TextShaper::from_config(config.shaping.clone())?;
    let shaped = shaper.shape(text, width, height, font_size, language);

    info!(
        "{} line(s), thai: {}, heading: {}, segmenter: {}",
        shaped.lines.len(),
        shaped.thai,
        shaped.heading,
        shaper.segmenter_name()
    );
    for line in &shaped.lines {
        println!("{:>6.0}px | {}", shaper.estimate_width_px(line, font_size, shaped.thai), line);
    }
    Ok(())
}

fn run_align(config: &Config, script: PathBuf, srt: PathBuf, min_start: f64, output: Option<PathBuf>) -> Result<()> {
    if FileManager::detect_file_type(&srt) != FileType::Subtitle {
        warn!("{:?} does not have an .srt extension, parsing it anyway", srt);
    }
    let script = FileManager::read_to_string(&script)?;
    let segments = parse_srt_string(&FileManager::read_to_string(&srt)?)?;

    let aligner = ScriptAligner::new(config.alignment.clone());
    let result = aligner
        .align_detailed(&segments, &script, min_start)
        .map_err(|e| anyhow!("Alignment failed: {}", e))?;
    info!("Aligned {} cues (score {:.3})", result.cues.len(), result.score);

    let srt = subtitle_processor::cues_to_srt(&result.cues);
    match output {
        Some(path) => {
            FileManager::write_to_file(&path, &srt)?;
            info!("Success: {:?}", path);
        }
        None => print!("{}", srt),
    }
    Ok(())
}
