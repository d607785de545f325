//! # Job Model Module
//!
//! Modello dati di una singola trasformazione richiesta al motore esterno.
//!
//! ## Responsabilità:
//! - `TranscodeConfig`: parametri immutabili della trasformazione
//! - `JobStatus`: ciclo di vita `Pending → Running → {Completed, Failed}`
//! - `Job`: identità, stato, progresso, errore e timestamp
//!
//! ## Invarianti:
//! - Lo stato avanza solo in avanti, mai indietro
//! - Il progresso è in `[0, 100]`, non diminuisce ed è esattamente 100 a `Completed`
//! - `error` è presente solo a `Failed`
//! - `started_at` è impostato all'ingresso in `Running`, `finished_at` allo stato terminale

use crate::filters::FilterChain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Parameters of one transformation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Video codec (e.g. libx264, copy)
    pub video_codec: Option<String>,
    /// Audio codec (e.g. aac, copy)
    pub audio_codec: Option<String>,
    /// Video bitrate (e.g. 2500k)
    pub video_bitrate: Option<String>,
    /// Audio bitrate (e.g. 128k)
    pub audio_bitrate: Option<String>,
    /// Output resolution as WIDTHxHEIGHT
    pub resolution: Option<String>,
    pub frame_rate: Option<String>,
    /// CRF value (0-51, lower = better quality)
    pub quality: Option<u8>,
    /// Container format passed to `-f`
    pub format: Option<String>,
    /// Drop the video stream (`-vn`)
    pub disable_video: bool,
    pub filters: FilterChain,
}

impl TranscodeConfig {
    pub fn new(input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            ..Default::default()
        }
    }

    /// Copy of this template bound to concrete paths
    pub fn with_paths(&self, input_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            ..self.clone()
        }
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }
}

/// Opaque job identifier, stable for the job's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One requested transformation and its lifecycle
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    id: JobId,
    config: TranscodeConfig,
    status: JobStatus,
    progress: f64,
    error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a pending job. Use [`crate::Transcoder::create_job`] to get a validated one.
    pub fn new(config: TranscodeConfig) -> Self {
        Self {
            id: JobId::new(),
            config,
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall-clock run time, once the job has finished
    pub fn elapsed(&self) -> Option<std::time::Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        (end - start).to_std().ok()
    }

    /// `Pending → Running`. Returns false if the job was not pending.
    pub(crate) fn start(&mut self) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        true
    }

    /// Advance progress while running. Values are clamped and never go backwards.
    pub(crate) fn update_progress(&mut self, percent: f64) {
        if self.status != JobStatus::Running || !percent.is_finite() {
            return;
        }
        self.progress = self.progress.max(percent.clamp(0.0, 100.0));
    }

    /// `Running → Completed`
    pub(crate) fn complete(&mut self) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Completed;
        self.progress = 100.0;
        self.finished_at = Some(Utc::now());
        true
    }

    /// `Running → Failed`
    pub(crate) fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(TranscodeConfig::new("in.mp4", "out.mp4"))
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = job();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.progress(), 0.0);
        assert!(job.error().is_none());
        assert!(job.started_at().is_none());
        assert!(job.finished_at().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(job().id(), job().id());
    }

    #[test]
    fn test_forward_transitions() {
        let mut job = job();
        assert!(job.start());
        assert_eq!(job.status(), JobStatus::Running);
        assert!(job.started_at().is_some());
        assert!(job.finished_at().is_none());

        job.update_progress(42.0);
        assert_eq!(job.progress(), 42.0);

        assert!(job.complete());
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 100.0);
        assert!(job.finished_at().is_some());
        assert!(job.elapsed().is_some());
        assert!(job.error().is_none());
    }

    #[test]
    fn test_no_backwards_or_skipping_transitions() {
        let mut job = job();
        // cannot finish without running
        assert!(!job.complete());
        assert!(!job.fail("boom"));
        assert_eq!(job.status(), JobStatus::Pending);

        assert!(job.start());
        assert!(!job.start());
        assert!(job.fail("boom"));
        assert_eq!(job.error(), Some("boom"));

        // terminal
        assert!(!job.start());
        assert!(!job.complete());
        assert_eq!(job.status(), JobStatus::Failed);
    }

    #[test]
    fn test_progress_clamped_and_monotonic() {
        let mut job = job();
        job.update_progress(30.0);
        assert_eq!(job.progress(), 0.0, "ignored while pending");

        job.start();
        job.update_progress(60.0);
        job.update_progress(20.0);
        assert_eq!(job.progress(), 60.0);
        job.update_progress(250.0);
        assert_eq!(job.progress(), 100.0);
        job.update_progress(f64::NAN);
        assert_eq!(job.progress(), 100.0);
    }

    #[test]
    fn test_template_with_paths_keeps_parameters() {
        let template = TranscodeConfig {
            video_codec: Some("libx264".into()),
            quality: Some(23),
            ..Default::default()
        };
        let bound = template.with_paths("a.mov", "b.mp4");
        assert_eq!(bound.input_path, PathBuf::from("a.mov"));
        assert_eq!(bound.output_path, PathBuf::from("b.mp4"));
        assert_eq!(bound.video_codec.as_deref(), Some("libx264"));
        assert_eq!(bound.quality, Some(23));
    }
}
