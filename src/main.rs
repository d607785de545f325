//! # Media Transcoder - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap` (sottocomandi)
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e applicazione degli override CLI
//! - Ctrl-C cancella il lavoro in corso tramite `CancellationToken`
//!
//! ## Sottocomandi:
//! - `transcode`: un singolo file, con preset e override per campo
//! - `batch`: una directory intera tramite la coda di job
//! - `pipeline`: pipeline predefinite (web, archive, mobile)
//! - `info` / `presets` / `tools`: diagnostica
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-transcoder batch /path/to/media --output /path/to/out --preset web-hd --workers 8
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use media_transcoder::{
    file_manager::FileManager,
    json_output::JsonMessage,
    presets,
    progress::{BatchStats, ProgressManager},
    tool_resolver::{ToolPathResolver, ENGINE_TOOLS},
    transcoder::preset_pipeline,
    Config, JobId, ProgressTracker, Queue, TranscodeConfig, Transcoder,
};

#[derive(Parser)]
#[command(name = "media-transcoder")]
#[command(about = "Transcode media with ffmpeg: single jobs, parallel batches and multi-step pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: <config dir>/media-transcoder/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the ffmpeg binary
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Output progress and status as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Transcode a single file
    Transcode {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Transcode every media file in a directory
    Batch {
        input_dir: PathBuf,
        /// Output directory, the input tree is mirrored into it
        #[arg(short, long)]
        output: PathBuf,
        /// Extension for output files (default: keep the input's)
        #[arg(long)]
        extension: Option<String>,
        #[command(flatten)]
        encode: EncodeArgs,
    },

    /// Run a preset pipeline: web, archive or mobile
    Pipeline {
        name: String,
        input: PathBuf,
        output: PathBuf,
        /// Directory for reports, thumbnails and extracted audio
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Show media information
    Info { file: PathBuf },

    /// List available presets
    Presets,

    /// Show where ffmpeg and ffprobe are found
    Tools,
}

#[derive(Args, Default)]
struct EncodeArgs {
    /// Start from a named preset
    #[arg(short, long)]
    preset: Option<String>,

    #[arg(long)]
    video_codec: Option<String>,

    #[arg(long)]
    audio_codec: Option<String>,

    #[arg(long)]
    video_bitrate: Option<String>,

    #[arg(long)]
    audio_bitrate: Option<String>,

    /// WIDTHxHEIGHT
    #[arg(long)]
    resolution: Option<String>,

    #[arg(long)]
    frame_rate: Option<String>,

    /// CRF value (0-51, lower = better quality)
    #[arg(long)]
    crf: Option<u8>,

    /// Container format
    #[arg(long)]
    format: Option<String>,

    /// Drop the video stream
    #[arg(long)]
    no_video: bool,
}

impl EncodeArgs {
    fn build(&self, input: &Path, output: &Path) -> Result<TranscodeConfig> {
        let base = match self.preset {
            Some(ref name) => presets::get(name)?.config,
            None => TranscodeConfig::default(),
        };

        let mut config = base.with_paths(input, output);
        let overrides = [
            (&mut config.video_codec, &self.video_codec),
            (&mut config.audio_codec, &self.audio_codec),
            (&mut config.video_bitrate, &self.video_bitrate),
            (&mut config.audio_bitrate, &self.audio_bitrate),
            (&mut config.resolution, &self.resolution),
            (&mut config.frame_rate, &self.frame_rate),
            (&mut config.format, &self.format),
        ];
        for (field, value) in overrides {
            if value.is_some() {
                *field = value.clone();
            }
        }
        if self.crf.is_some() {
            config.quality = self.crf;
        }
        if self.no_video {
            config.disable_video = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json)?;

    let config = load_config(&cli).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️  Interrupted, cancelling running work");
            interrupt.cancel();
        }
    });

    let result = match cli.command {
        Command::Transcode { input, output, encode } => {
            transcode(&config, &input, &output, &encode, &cancel).await
        }
        Command::Batch {
            input_dir,
            output,
            extension,
            encode,
        } => batch(&config, &input_dir, &output, extension.as_deref(), &encode, &cancel).await,
        Command::Pipeline {
            name,
            input,
            output,
            artifacts,
        } => pipeline(&config, &name, &input, &output, artifacts, &cancel).await,
        Command::Info { file } => show_info(&config, &file).await,
        Command::Presets => list_presets(config.json_output),
        Command::Tools => show_tools(config.json_output),
    };

    if let Err(ref e) = result {
        if config.json_output {
            JsonMessage::error(e.to_string(), e.chain().nth(1).map(|s| s.to_string())).emit();
        }
    }
    result
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // stdout carries only JSON events in --json mode
    if json {
        tracing::subscriber::set_global_default(builder.with_writer(std::io::stderr).finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::from_file(&path).await?,
        None => Config::default(),
    };

    if let Some(ref ffmpeg) = cli.ffmpeg {
        config.ffmpeg_path = Some(ffmpeg.clone());
    }
    if let Some(ref ffprobe) = cli.ffprobe {
        config.ffprobe_path = Some(ffprobe.clone());
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    config.json_output |= cli.json;

    config.validate()?;
    Ok(config)
}

async fn transcode(
    config: &Config,
    input: &Path,
    output: &Path,
    encode: &EncodeArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let started = Instant::now();
    let transcoder = Transcoder::from_config(config).await?;
    let mut job = transcoder.create_job(encode.build(input, output)?)?;
    let json = config.json_output;

    if json {
        JsonMessage::start("transcode", 1, 1).emit();
        JsonMessage::job_start(&job).emit();
    }

    let bar = (!json).then(ProgressManager::for_job);
    let sink = bar.clone();
    let job_id = job.id();
    let tracker = ProgressTracker::new(move |update| match sink {
        Some(ref bar) => bar.apply(&update),
        None => JsonMessage::progress(job_id, &update).emit(),
    });

    let result = transcoder.execute_with_progress(&mut job, cancel, &tracker).await;

    if let Some(bar) = bar {
        match result {
            Ok(()) => bar.finish(&format!("✅ {}", output.display())),
            Err(_) => bar.abandon(),
        }
    }
    if json {
        JsonMessage::job_complete(&job).emit();
        let stats = BatchStats::from_jobs(std::slice::from_ref(&job));
        JsonMessage::complete(&stats, started.elapsed().as_secs_f64()).emit();
    }

    result?;
    info!("✅ {} -> {}", input.display(), output.display());
    Ok(())
}

async fn batch(
    config: &Config,
    input_dir: &Path,
    output_dir: &Path,
    extension: Option<&str>,
    encode: &EncodeArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let started = Instant::now();
    let files = FileManager::find_media_files(input_dir)?;
    info!("🔍 Found {} media files in {}", files.len(), input_dir.display());
    if files.is_empty() {
        return Ok(());
    }

    let transcoder = Arc::new(Transcoder::from_config(config).await?);
    let queue = Queue::new(transcoder, config.workers);
    let json = config.json_output;

    for file in &files {
        let output = FileManager::batch_output_path(file, input_dir, output_dir, extension)?;
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match queue.submit(encode.build(file, &output)?) {
            Ok(id) if json => {
                if let Some(job) = queue.job(id) {
                    JsonMessage::job_start(&job).emit();
                }
            }
            Ok(_) => {}
            Err(e) => warn!("⏭️  Skipping {}: {}", file.display(), e),
        }
    }

    let total = queue.jobs().len();
    if json {
        JsonMessage::start("batch", total, queue.workers()).emit();
    }
    let bar = (!json).then(|| ProgressManager::for_batch(total as u64));

    queue.start();

    let mut reported = HashSet::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut aborted = false;
    let idle = queue.wait_idle();
    tokio::pin!(idle);

    loop {
        tokio::select! {
            _ = &mut idle => break,
            _ = cancel.cancelled(), if !aborted => {
                queue.abort();
                aborted = true;
            }
            _ = ticker.tick() => report_finished(&queue, &mut reported, bar.as_ref(), json),
        }
    }
    report_finished(&queue, &mut reported, bar.as_ref(), json);
    queue.shutdown().await;

    let stats = BatchStats::from_jobs(&queue.jobs());
    match bar {
        Some(bar) => bar.finish(&stats.format_summary()),
        None => JsonMessage::complete(&stats, started.elapsed().as_secs_f64()).emit(),
    }
    info!("📊 {}", stats.format_summary());

    if stats.failed > 0 {
        return Err(anyhow::anyhow!("{} of {} jobs failed", stats.failed, stats.total));
    }
    if aborted {
        return Err(anyhow::anyhow!("batch cancelled"));
    }
    Ok(())
}

/// Report jobs that reached a terminal status since the last call
fn report_finished(queue: &Queue, reported: &mut HashSet<JobId>, bar: Option<&ProgressManager>, json: bool) {
    let jobs = queue.jobs();
    for job in jobs.iter().filter(|j| j.status().is_terminal()) {
        if !reported.insert(job.id()) {
            continue;
        }
        if json {
            JsonMessage::job_complete(job).emit();
        } else if let Some(error) = job.error() {
            warn!("❌ {}: {}", job.config().input_path.display(), error);
        }
    }

    if let Some(bar) = bar {
        let running = jobs
            .iter()
            .filter(|j| j.status() == media_transcoder::JobStatus::Running)
            .count();
        bar.set_done(reported.len() as u64, &format!("{} running", running));
    }
}

async fn pipeline(
    config: &Config,
    name: &str,
    input: &Path,
    output: &Path,
    artifacts: Option<PathBuf>,
    cancel: &CancellationToken,
) -> Result<()> {
    let started = Instant::now();
    let transcoder = Arc::new(Transcoder::from_config(config).await?);

    let artifacts = artifacts.unwrap_or_else(|| {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}_artifacts", stem))
    });
    tokio::fs::create_dir_all(&artifacts).await?;

    let json = config.json_output;
    let spinner = (!json).then(|| ProgressManager::spinner(&format!("Pipeline '{}'", name)));
    let sink = spinner.clone();
    let pipeline_name = name.to_string();

    let pipeline = preset_pipeline(name, transcoder, &artifacts)?.on_step(move |index, total, step| {
        match sink {
            Some(ref spinner) => spinner.set_message(format!("[{}/{}] {}", index, total, step)),
            None => JsonMessage::pipeline_step(&pipeline_name, step, index, total).emit(),
        }
    });

    if json {
        JsonMessage::start("pipeline", pipeline.len(), 1).emit();
    }

    let result = pipeline.execute(input, output, cancel).await;

    if let Some(spinner) = spinner {
        match result {
            Ok(()) => spinner.finish_with_message(format!("✅ {}", output.display())),
            Err(_) => spinner.finish_and_clear(),
        }
    }

    result?;
    if json {
        let mut stats = BatchStats::new();
        stats.total = 1;
        stats.completed = 1;
        stats.total_input_size = FileManager::get_file_size(input).await.unwrap_or(0);
        stats.total_output_size = FileManager::get_file_size(output).await.unwrap_or(0);
        JsonMessage::complete(&stats, started.elapsed().as_secs_f64()).emit();
    }
    info!("📁 Artifacts in {}", artifacts.display());
    Ok(())
}

async fn show_info(config: &Config, file: &Path) -> Result<()> {
    let transcoder = Transcoder::from_config(config).await?;
    let info = transcoder.media_info(file).await?;

    if config.json_output {
        println!("{}", serde_json::to_string(&info)?);
        return Ok(());
    }

    println!("📄 {}", file.display());
    if !info.format.format_long_name.is_empty() {
        println!("   Format:   {}", info.format.format_long_name);
    }
    println!("   Summary:  {}", info.summary());
    for stream in &info.streams {
        println!(
            "   Stream #{}: {} ({})",
            stream.index, stream.codec_type, stream.codec_name
        );
    }
    if let Some(title) = info.title() {
        println!("   Title:    {}", title);
    }
    if let Some(artist) = info.artist() {
        println!("   Artist:   {}", artist);
    }
    Ok(())
}

fn list_presets(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&presets::all())?);
        return Ok(());
    }

    for (category, group) in presets::by_category() {
        println!("\n{}:", category.label());
        for preset in group {
            println!("  {:<16} {}", preset.name, preset.description);
        }
    }
    Ok(())
}

fn show_tools(json: bool) -> Result<()> {
    let resolver = ToolPathResolver::new();

    if json {
        let tools: serde_json::Map<String, serde_json::Value> = ENGINE_TOOLS
            .iter()
            .map(|tool| {
                let path = resolver.resolve_tool(tool).map(|p| p.display().to_string());
                (tool.to_string(), serde_json::json!(path))
            })
            .collect();
        println!("{}", serde_json::Value::Object(tools));
        return Ok(());
    }

    print!("{}", resolver.tools_report());
    Ok(())
}
