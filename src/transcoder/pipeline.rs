//! # Pipeline
//!
//! Catena ordinata di step eterogenei: l'output di ogni step diventa l'input del successivo.
//!
//! ## Responsabilità:
//! - Directory scratch privata e unica per ogni `execute`, rimossa su ogni percorso di uscita
//! - Interruzione al primo errore, con il nome dello step che ha fallito
//! - Collocazione dell'artefatto finale nella destinazione richiesta
//! - Pipeline predefinite: web, archivio, mobile
//!
//! ## Flusso:
//! 1. Creazione scratch dir (`pipeline_XXXX`) sotto la temp root del transcoder
//! 2. Esecuzione sequenziale degli step
//! 3. Rename (o copia) dell'ultimo artefatto sulla destinazione
//! 4. Rimozione esplicita della scratch dir, gli errori di rimozione vengono riportati

use crate::error::{Result, TranscodeError};
use crate::filters::{Filter, FilterChain};
use crate::job::TranscodeConfig;
use crate::transcoder::steps::{AnalyzeStep, ExtractAudioStep, FilterStep, ThumbnailStep, TranscodeStep};
use crate::transcoder::Transcoder;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One stage of a [`Pipeline`]
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// Process `input` and return the artifact for the next step.
    /// Side-effecting steps return `input` unchanged.
    async fn execute(&self, input: &Path, ctx: &StepContext<'_>) -> Result<PathBuf>;
}

/// Resources available to a step during one pipeline run
pub struct StepContext<'a> {
    transcoder: &'a Transcoder,
    scratch: &'a Path,
    cancel: &'a CancellationToken,
    counter: AtomicUsize,
}

impl<'a> StepContext<'a> {
    pub fn new(transcoder: &'a Transcoder, scratch: &'a Path, cancel: &'a CancellationToken) -> Self {
        Self {
            transcoder,
            scratch,
            cancel,
            counter: AtomicUsize::new(0),
        }
    }

    pub fn transcoder(&self) -> &Transcoder {
        self.transcoder
    }

    pub fn scratch(&self) -> &Path {
        self.scratch
    }

    pub fn cancel(&self) -> &CancellationToken {
        self.cancel
    }

    /// Fresh file path inside the scratch directory
    pub fn scratch_path(&self, stem: &str, extension: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.scratch.join(format!("{:02}_{}.{}", n, stem, extension))
    }
}

/// Called before each step with `(index, total, step name)`, index starting at 1
pub type StepObserver = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

pub struct Pipeline {
    name: String,
    description: String,
    steps: Vec<Box<dyn PipelineStep>>,
    transcoder: Arc<Transcoder>,
    observer: Option<StepObserver>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, description: impl Into<String>, transcoder: Arc<Transcoder>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
            transcoder,
            observer: None,
        }
    }

    pub fn add_step(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn on_step(mut self, observer: impl Fn(usize, usize, &str) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> impl Iterator<Item = &dyn PipelineStep> {
        self.steps.iter().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step on `input`, leaving the final artifact at `output`
    pub async fn execute(&self, input: &Path, output: &Path, cancel: &CancellationToken) -> Result<()> {
        if self.steps.is_empty() {
            return Err(TranscodeError::InvalidInput(format!(
                "pipeline '{}' has no steps",
                self.name
            )));
        }

        info!("🔗 Running pipeline '{}' ({} steps)", self.name, self.steps.len());
        let scratch = self.create_scratch().await?;
        debug!("Scratch directory: {}", scratch.path().display());

        let result = self.run_steps(input, output, scratch.path(), cancel).await;

        let scratch_path = scratch.path().to_path_buf();
        let cleanup = scratch.close().map_err(|e| {
            TranscodeError::Workspace(format!(
                "failed to remove scratch directory {}: {}",
                scratch_path.display(),
                e
            ))
        });

        match (result, cleanup) {
            (Err(e), Err(cleanup_err)) => {
                warn!("{}", cleanup_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(cleanup_err)) => Err(cleanup_err),
            (Ok(()), Ok(())) => {
                info!("✅ Pipeline '{}' finished: {}", self.name, output.display());
                Ok(())
            }
        }
    }

    async fn create_scratch(&self) -> Result<TempDir> {
        let root = self.transcoder.temp_dir();
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            TranscodeError::Workspace(format!("cannot create {}: {}", root.display(), e))
        })?;

        tempfile::Builder::new()
            .prefix("pipeline_")
            .tempdir_in(root)
            .map_err(|e| TranscodeError::Workspace(format!("cannot create scratch directory: {}", e)))
    }

    async fn run_steps(
        &self,
        input: &Path,
        output: &Path,
        scratch: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let ctx = StepContext::new(&self.transcoder, scratch, cancel);
        let total = self.steps.len();
        let mut current = input.to_path_buf();

        for (i, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TranscodeError::in_step(step.name(), i + 1, total, TranscodeError::Cancelled));
            }

            info!("🔧 [{}/{}] {}: {}", i + 1, total, step.name(), step.description());
            if let Some(observer) = &self.observer {
                observer(i + 1, total, step.name());
            }
            current = step
                .execute(&current, &ctx)
                .await
                .map_err(|e| TranscodeError::in_step(step.name(), i + 1, total, e))?;
        }

        if current != output {
            relocate(&current, output, scratch).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Move a scratch artifact into place, or copy anything that lives outside scratch
async fn relocate(artifact: &Path, output: &Path, scratch: &Path) -> Result<()> {
    let result = if artifact.starts_with(scratch) {
        match tokio::fs::rename(artifact, output).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("Rename failed ({}), falling back to copy", e);
                tokio::fs::copy(artifact, output).await.map(|_| ())
            }
        }
    } else {
        tokio::fs::copy(artifact, output).await.map(|_| ())
    };

    result.map_err(|e| {
        TranscodeError::Workspace(format!(
            "failed to place {} at {}: {}",
            artifact.display(),
            output.display(),
            e
        ))
    })
}

// Preset pipelines

/// Analysis, filtering, thumbnails, mp3 extraction and a final H.264 encode
pub fn web_optimization_pipeline(transcoder: Arc<Transcoder>, artifacts_dir: &Path) -> Pipeline {
    let filters = FilterChain::new()
        .add_video_filter(Filter::scale(1920, 1080))
        .add_video_filter(Filter::brightness_contrast(0.05, 1.1))
        .add_audio_filter(Filter::volume(0.9));

    Pipeline::new(
        "web-optimization",
        "Full web optimization with thumbnails and audio extraction",
        transcoder,
    )
    .add_step(AnalyzeStep::new(artifacts_dir.join("analysis.txt")))
    .add_step(FilterStep::new(
        filters,
        TranscodeConfig {
            video_codec: Some("libx264".into()),
            audio_codec: Some("aac".into()),
            quality: Some(22),
            ..Default::default()
        },
    ))
    .add_step(ThumbnailStep::new(
        ["00:00:05", "00:00:30", "00:01:00"],
        artifacts_dir.join("thumbnails"),
    ))
    .add_step(ExtractAudioStep::new(artifacts_dir.join("audio.mp3"), "mp3"))
    .add_step(TranscodeStep::new(TranscodeConfig {
        video_codec: Some("libx264".into()),
        audio_codec: Some("aac".into()),
        video_bitrate: Some("2000k".into()),
        audio_bitrate: Some("128k".into()),
        quality: Some(23),
        format: Some("mp4".into()),
        ..Default::default()
    }))
}

/// Lossless-leaning archive copy with analysis, thumbnails and FLAC audio
pub fn archive_pipeline(transcoder: Arc<Transcoder>, artifacts_dir: &Path) -> Pipeline {
    Pipeline::new("archive", "High quality archival copy", transcoder)
        .add_step(AnalyzeStep::new(artifacts_dir.join("archive_analysis.txt")))
        .add_step(ThumbnailStep::new(
            ["00:00:01", "00:01:00", "00:05:00", "00:10:00"],
            artifacts_dir.join("archive_thumbnails"),
        ))
        .add_step(ExtractAudioStep::new(artifacts_dir.join("archive_audio.flac"), "flac"))
        .add_step(TranscodeStep::new(TranscodeConfig {
            video_codec: Some("libx265".into()),
            audio_codec: Some("flac".into()),
            quality: Some(18),
            format: Some("mkv".into()),
            ..Default::default()
        }))
}

/// Downscaled, band-limited encode for phones
pub fn mobile_pipeline(transcoder: Arc<Transcoder>, artifacts_dir: &Path) -> Pipeline {
    let filters = FilterChain::new()
        .add_video_filter(Filter::scale(854, 480))
        .add_video_filter(Filter::brightness_contrast(0.0, 1.05))
        .add_audio_filter(Filter::volume(0.95))
        .add_audio_filter(Filter::lowpass(15000));

    Pipeline::new("mobile", "Optimization for mobile devices", transcoder)
        .add_step(FilterStep::new(
            filters,
            TranscodeConfig {
                video_codec: Some("libx264".into()),
                audio_codec: Some("aac".into()),
                quality: Some(28),
                ..Default::default()
            },
        ))
        .add_step(ThumbnailStep::new(["00:00:10"], artifacts_dir.join("mobile_thumb")))
        .add_step(TranscodeStep::new(TranscodeConfig {
            video_codec: Some("libx264".into()),
            audio_codec: Some("aac".into()),
            video_bitrate: Some("800k".into()),
            audio_bitrate: Some("64k".into()),
            quality: Some(28),
            format: Some("mp4".into()),
            ..Default::default()
        }))
}

/// Preset pipeline by name: `web`, `archive` or `mobile`
pub fn preset_pipeline(name: &str, transcoder: Arc<Transcoder>, artifacts_dir: &Path) -> Result<Pipeline> {
    match name {
        "web" | "web-optimization" => Ok(web_optimization_pipeline(transcoder, artifacts_dir)),
        "archive" => Ok(archive_pipeline(transcoder, artifacts_dir)),
        "mobile" => Ok(mobile_pipeline(transcoder, artifacts_dir)),
        other => Err(TranscodeError::UnknownPreset(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use std::time::Duration;

    struct Fixture {
        dir: TempDir,
        engine: Arc<FakeEngine>,
        transcoder: Arc<Transcoder>,
    }

    impl Fixture {
        fn new(engine: FakeEngine) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("input.mp4"), b"source").unwrap();
            let engine = Arc::new(engine);
            let transcoder = Arc::new(Transcoder::new(engine.clone(), dir.path().join("tmp")));
            Self { dir, engine, transcoder }
        }

        fn input(&self) -> PathBuf {
            self.dir.path().join("input.mp4")
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("final.mp4")
        }

        fn pipeline(&self) -> Pipeline {
            Pipeline::new("test", "test pipeline", self.transcoder.clone())
        }

        fn scratch_entries(&self) -> usize {
            std::fs::read_dir(self.transcoder.temp_dir())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    fn encode(codec: &str) -> TranscodeStep {
        TranscodeStep::new(TranscodeConfig {
            video_codec: Some(codec.into()),
            format: Some("mp4".into()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_steps_compose_in_order() {
        let fx = Fixture::new(FakeEngine::new());
        let pipeline = fx
            .pipeline()
            .add_step(encode("libx264"))
            .add_step(encode("libx265"))
            .add_step(encode("libvpx-vp9"));

        pipeline.execute(&fx.input(), &fx.output(), &CancellationToken::new()).await.unwrap();

        let content = std::fs::read_to_string(fx.output()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "source");
        assert!(lines[1].contains("-c:v libx264"));
        assert!(lines[2].contains("-c:v libx265"));
        assert!(lines[3].contains("-c:v libvpx-vp9"));
        assert_eq!(fx.scratch_entries(), 0);
    }

    #[tokio::test]
    async fn test_failing_step_writes_nothing_and_cleans_up() {
        let fx = Fixture::new(FakeEngine::new());
        fx.engine.fail_on("libx265");
        let pipeline = fx
            .pipeline()
            .add_step(encode("libx264"))
            .add_step(encode("libx265"))
            .add_step(encode("libvpx-vp9"));

        let err = pipeline
            .execute(&fx.input(), &fx.output(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TranscodeError::Step { ref step, position: 2, total: 3, .. } if step == "transcode"
        ));
        assert!(err.to_string().starts_with("step 2/3 'transcode' failed"));
        assert!(!fx.output().exists());
        assert_eq!(fx.scratch_entries(), 0);
        assert_eq!(fx.engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_side_effect_step_does_not_redirect_chain() {
        let fx = Fixture::new(FakeEngine::new());
        let thumbs = fx.dir.path().join("thumbs");

        let with_thumbs = fx
            .pipeline()
            .add_step(encode("libx264"))
            .add_step(ThumbnailStep::new(["00:00:01"], &thumbs))
            .add_step(encode("libx265"));
        let plain = fx.pipeline().add_step(encode("libx264")).add_step(encode("libx265"));

        let other_output = fx.dir.path().join("plain.mp4");
        let cancel = CancellationToken::new();
        with_thumbs.execute(&fx.input(), &fx.output(), &cancel).await.unwrap();
        plain.execute(&fx.input(), &other_output, &cancel).await.unwrap();

        assert_eq!(
            std::fs::read(fx.output()).unwrap(),
            std::fs::read(&other_output).unwrap()
        );
        assert!(thumbs.join("thumbnail_1.jpg").exists());
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_rejected() {
        let fx = Fixture::new(FakeEngine::new());
        let err = fx
            .pipeline()
            .execute(&fx.input(), &fx.output(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cancellation_still_cleans_up() {
        let fx = Fixture::new(FakeEngine::with_delay(Duration::from_secs(30)));
        let pipeline = fx.pipeline().add_step(encode("libx264")).add_step(encode("libx265"));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            pipeline.execute(&fx.input(), &fx.output(), &cancel),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(err.is_cancelled());
        assert!(!fx.output().exists());
        assert_eq!(fx.scratch_entries(), 0);
    }

    #[tokio::test]
    async fn test_side_effect_only_chain_copies_input() {
        let fx = Fixture::new(FakeEngine::new());
        let report = fx.dir.path().join("report.txt");
        let pipeline = fx.pipeline().add_step(AnalyzeStep::new(&report));

        pipeline.execute(&fx.input(), &fx.output(), &CancellationToken::new()).await.unwrap();

        assert!(fx.input().exists());
        assert_eq!(std::fs::read(fx.output()).unwrap(), b"source");
        assert!(report.exists());
    }

    #[tokio::test]
    async fn test_pipeline_can_run_twice() {
        let fx = Fixture::new(FakeEngine::new());
        let pipeline = fx.pipeline().add_step(encode("libx264"));
        let cancel = CancellationToken::new();

        pipeline.execute(&fx.input(), &fx.output(), &cancel).await.unwrap();
        let second = fx.dir.path().join("second.mp4");
        pipeline.execute(&fx.input(), &second, &cancel).await.unwrap();

        assert!(second.exists());
        assert_eq!(fx.scratch_entries(), 0);
    }

    #[tokio::test]
    async fn test_web_pipeline_produces_artifacts() {
        let fx = Fixture::new(FakeEngine::new());
        let artifacts = fx.dir.path().join("artifacts");
        let pipeline = web_optimization_pipeline(fx.transcoder.clone(), &artifacts);

        let names: Vec<&str> = pipeline.steps().map(|s| s.name()).collect();
        assert_eq!(names, vec!["analyze", "filter", "thumbnails", "extract-audio", "transcode"]);

        pipeline.execute(&fx.input(), &fx.output(), &CancellationToken::new()).await.unwrap();

        assert!(artifacts.join("analysis.txt").exists());
        for i in 1..=3 {
            assert!(artifacts.join("thumbnails").join(format!("thumbnail_{}.jpg", i)).exists());
        }
        assert!(artifacts.join("audio.mp3").exists());
        let content = std::fs::read_to_string(fx.output()).unwrap();
        assert!(content.contains("scale=h=1080:w=1920"));
        assert!(content.contains("-b:v 2000k"));
    }

    #[tokio::test]
    async fn test_observer_sees_each_step() {
        let fx = Fixture::new(FakeEngine::new());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipeline = fx
            .pipeline()
            .add_step(AnalyzeStep::new(fx.dir.path().join("r.txt")))
            .add_step(encode("libx264"))
            .on_step(move |i, total, name| sink.lock().push(format!("{}/{} {}", i, total, name)));

        pipeline.execute(&fx.input(), &fx.output(), &CancellationToken::new()).await.unwrap();
        assert_eq!(*seen.lock(), vec!["1/2 analyze", "2/2 transcode"]);
    }

    #[test]
    fn test_preset_pipeline_lookup() {
        let fx = Fixture::new(FakeEngine::new());
        let artifacts = fx.dir.path();
        assert_eq!(preset_pipeline("archive", fx.transcoder.clone(), artifacts).unwrap().len(), 4);
        assert_eq!(preset_pipeline("mobile", fx.transcoder.clone(), artifacts).unwrap().len(), 3);
        assert!(matches!(
            preset_pipeline("tiktok", fx.transcoder.clone(), artifacts),
            Err(TranscodeError::UnknownPreset(_))
        ));
    }
}
