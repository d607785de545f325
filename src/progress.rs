//! # Progress Display and Statistics Module
//!
//! Questo modulo gestisce il feedback visivo da terminale e le statistiche dei batch.
//!
//! ## Responsabilità:
//! - Barra di progresso `indicatif` per un singolo job (percentuale, velocità, ETA)
//! - Barra di progresso per un batch (job terminati / totali)
//! - Spinner per operazioni indeterminate (probe, pipeline)
//! - Statistiche aggregate dei job completati e falliti
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:42] [=========================>--------------]  64% 2.50x ETA 23s
//! ```

use crate::file_manager::FileManager;
use crate::job::{Job, JobStatus};
use crate::transcoder::ProgressUpdate;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages terminal progress bars
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Bar for one job, measured in percent
    pub fn for_job() -> Self {
        let bar = ProgressBar::new(100);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                .expect("valid progress template")
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Bar for a batch of `total_jobs`
    pub fn for_batch(total_jobs: u64) -> Self {
        let bar = ProgressBar::new(total_jobs);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("valid progress template")
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Apply a tracker observation to a job bar
    pub fn apply(&self, update: &ProgressUpdate) {
        if let Some(percent) = update.percent {
            self.bar.set_position(percent.round() as u64);
        }
        self.bar.set_message(format_update(update));
    }

    /// Move a batch bar to `done` finished jobs
    pub fn set_done(&self, done: u64, message: &str) {
        self.bar.set_position(done);
        self.bar.set_message(message.to_string());
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Remove the bar, e.g. before printing an error
    pub fn abandon(&self) {
        self.bar.finish_and_clear();
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .expect("valid spinner template"),
        );

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// `2.50x ETA 23s`, omitting whatever the update lacks
pub fn format_update(update: &ProgressUpdate) -> String {
    let mut parts = Vec::new();
    if let Some(ref speed) = update.speed {
        parts.push(speed.clone());
    }
    if let Some(eta) = update.eta {
        parts.push(format!("ETA {}s", eta.as_secs()));
    }
    parts.join(" ")
}

/// Aggregate results of a batch run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub total_input_size: u64,
    pub total_output_size: u64,
    /// Sum of per-job run times
    pub busy_time: Duration,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build statistics from a queue snapshot, reading file sizes from disk
    pub fn from_jobs(jobs: &[Job]) -> Self {
        let mut stats = Self::new();
        for job in jobs {
            stats.add(job);
        }
        stats
    }

    pub fn add(&mut self, job: &Job) {
        self.total += 1;
        match job.status() {
            JobStatus::Completed => {
                self.completed += 1;
                self.total_input_size += file_size(&job.config().input_path);
                self.total_output_size += file_size(&job.config().output_path);
            }
            JobStatus::Failed => self.failed += 1,
            JobStatus::Pending | JobStatus::Running => self.pending += 1,
        }
        if let Some(elapsed) = job.elapsed() {
            self.busy_time += elapsed;
        }
    }

    /// Output size relative to input size, for completed jobs
    pub fn size_ratio_percent(&self) -> f64 {
        if self.total_input_size > 0 {
            self.total_output_size as f64 / self.total_input_size as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Jobs: {} | Completed: {} | Failed: {} | Not run: {} | Input: {} | Output: {} ({:.1}%)",
            self.total,
            self.completed,
            self.failed,
            self.pending,
            FileManager::format_size(self.total_input_size),
            FileManager::format_size(self.total_output_size),
            self.size_ratio_percent()
        )
    }
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
