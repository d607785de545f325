//! # Transcoder
//!
//! Facciata principale: crea job validati e li esegue tramite l'`Engine`.
//!
//! ## Responsabilità:
//! - `create_job`: valida la configurazione, nessun job invalido viene creato
//! - `execute` / `execute_with_progress`: ciclo `Pending → Running → {Completed, Failed}`
//! - Operazioni di comodo: miniature, conversione di formato, estrazione audio
//! - Probe dei metadati e della durata
//!
//! ## Esempio:
//! ```rust,ignore
//! let transcoder = Transcoder::from_config(&config).await?;
//! let mut job = transcoder.create_job(TranscodeConfig::new("in.mov", "out.mp4"))?;
//! transcoder.execute(&mut job, &CancellationToken::new()).await?;
//! ```

use crate::command::{build_thumbnail_args, build_transcode_args, codecs_for_format};
use crate::config::Config;
use crate::engine::{Engine, FfmpegEngine};
use crate::error::{Result, TranscodeError};
use crate::job::{Job, JobStatus, TranscodeConfig};
use crate::media_info::MediaInfo;
use crate::transcoder::ProgressTracker;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Transcoder {
    engine: Arc<dyn Engine>,
    temp_dir: PathBuf,
}

impl Transcoder {
    /// Transcoder over any engine. `temp_dir` is the root for pipeline scratch directories.
    pub fn new(engine: Arc<dyn Engine>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            temp_dir: temp_dir.into(),
        }
    }

    /// Resolve ffmpeg/ffprobe, check they start and create the temp root
    pub async fn from_config(config: &Config) -> Result<Self> {
        let engine = FfmpegEngine::from_config(config)?;
        engine.check_available().await?;

        tokio::fs::create_dir_all(&config.temp_dir).await.map_err(|e| {
            TranscodeError::Workspace(format!(
                "cannot create temp directory {}: {}",
                config.temp_dir.display(),
                e
            ))
        })?;

        Ok(Self::new(Arc::new(engine), config.temp_dir.clone()))
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Validate `config` and wrap it in a pending job
    pub fn create_job(&self, config: TranscodeConfig) -> Result<Job> {
        config.validate()?;
        let job = Job::new(config);
        debug!("Created job {}", job.id());
        Ok(job)
    }

    /// Run a pending job to a terminal status
    pub async fn execute(&self, job: &mut Job, cancel: &CancellationToken) -> Result<()> {
        self.execute_inner(job, cancel, None).await
    }

    /// Like [`execute`](Self::execute), feeding engine output to `tracker`.
    /// The input is probed for its duration when the tracker has none.
    pub async fn execute_with_progress(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
        tracker: &ProgressTracker,
    ) -> Result<()> {
        self.execute_inner(job, cancel, Some(tracker)).await
    }

    async fn execute_inner(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
        tracker: Option<&ProgressTracker>,
    ) -> Result<()> {
        if !job.start() {
            return Err(TranscodeError::InvalidInput(format!(
                "job {} is {}, not pending",
                job.id(),
                job.status()
            )));
        }

        let result = self.run(job.config(), cancel, tracker).await;
        self.finish(job, &result);
        result
    }

    /// Record the outcome of a running job
    pub(crate) fn finish(&self, job: &mut Job, result: &Result<()>) {
        debug_assert_eq!(job.status(), JobStatus::Running);
        match result {
            Ok(()) => {
                job.complete();
                info!(
                    "✅ Job {} completed in {:.1}s",
                    job.id(),
                    job.elapsed().unwrap_or_default().as_secs_f64()
                );
            }
            Err(e) => {
                job.fail(e.to_string());
                error!("❌ Job {} failed: {}", job.id(), e);
            }
        }
    }

    /// Engine invocation for one configuration, without job bookkeeping
    pub(crate) async fn run(
        &self,
        config: &TranscodeConfig,
        cancel: &CancellationToken,
        tracker: Option<&ProgressTracker>,
    ) -> Result<()> {
        config.validate()?;

        info!(
            "🎬 Transcoding {} -> {}",
            config.input_path.display(),
            config.output_path.display()
        );

        if let Some(tracker) = tracker {
            if tracker.duration().is_none() {
                match self.duration(&config.input_path).await {
                    Ok(Some(duration)) => tracker.set_duration(duration),
                    Ok(None) => debug!("No duration for {}", config.input_path.display()),
                    Err(e) => warn!("Could not probe {}: {}", config.input_path.display(), e),
                }
            }
        }

        let args = build_transcode_args(config);
        self.engine.execute(&args, cancel, tracker).await
    }

    /// Extract one frame at `offset` into `output`
    pub async fn create_thumbnail(
        &self,
        input: &Path,
        output: &Path,
        offset: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!("📸 Thumbnail of {} at {} -> {}", input.display(), offset, output.display());
        let args = build_thumbnail_args(input, output, offset);
        self.engine.execute(&args, cancel, None).await
    }

    /// Convert to `format` with that container's default codecs
    pub async fn convert_to_format(
        &self,
        input: &Path,
        output: &Path,
        format: &str,
        cancel: &CancellationToken,
    ) -> Result<Job> {
        let codecs = codecs_for_format(format);
        let config = TranscodeConfig {
            video_codec: codecs.video_codec.map(str::to_string),
            audio_codec: Some(codecs.audio_codec.to_string()),
            audio_bitrate: codecs.audio_bitrate.map(str::to_string),
            disable_video: codecs.video_codec.is_none(),
            format: Some(format.to_string()),
            ..TranscodeConfig::new(input, output)
        };

        let mut job = self.create_job(config)?;
        self.execute(&mut job, cancel).await?;
        Ok(job)
    }

    /// Copy the audio stream out without re-encoding
    pub async fn extract_audio(&self, input: &Path, output: &Path, cancel: &CancellationToken) -> Result<Job> {
        let config = TranscodeConfig {
            audio_codec: Some("copy".to_string()),
            disable_video: true,
            ..TranscodeConfig::new(input, output)
        };

        let mut job = self.create_job(config)?;
        self.execute(&mut job, cancel).await?;
        Ok(job)
    }

    pub async fn media_info(&self, path: &Path) -> Result<MediaInfo> {
        let info = self.engine.probe(path).await?;
        debug!("Probed {}: {}", path.display(), info.summary());
        Ok(info)
    }

    pub async fn duration(&self, path: &Path) -> Result<Option<Duration>> {
        Ok(self.media_info(path).await?.duration())
    }
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}
