//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON (una riga per evento) per
//! processi che pilotano la CLI con `--json`.
//!
//! ## Responsabilità:
//! - Emette messaggi JSON strutturati su stdout
//! - Riutilizza gli snapshot dei `Job` e le `BatchStats`
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio operazione (transcode, batch o pipeline)
//! - `job_start`: Un job è stato accodato o avviato
//! - `progress`: Progresso di un job (percentuale, velocità, ETA)
//! - `job_complete`: Fine di un job, con stato finale ed eventuale errore
//! - `pipeline_step`: Uno step di pipeline è iniziato
//! - `complete`: Fine operazione con statistiche finali
//! - `error`: Errore generale

use crate::job::{Job, JobId, JobStatus};
use crate::progress::BatchStats;
use crate::transcoder::ProgressUpdate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        operation: String,
        total_jobs: usize,
        workers: usize,
    },

    JobStart {
        job_id: String,
        input: PathBuf,
        output: PathBuf,
    },

    Progress {
        job_id: String,
        percent: Option<f64>,
        speed: Option<String>,
        eta_seconds: Option<f64>,
    },

    JobComplete {
        job_id: String,
        status: JobStatus,
        output: PathBuf,
        duration_seconds: Option<f64>,
        error: Option<String>,
    },

    PipelineStep {
        pipeline: String,
        step: String,
        index: usize,
        total: usize,
    },

    Complete {
        total: usize,
        completed: usize,
        failed: usize,
        not_run: usize,
        total_input_size: u64,
        total_output_size: u64,
        duration_seconds: f64,
    },

    Error {
        message: String,
        details: Option<String>,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(operation: &str, total_jobs: usize, workers: usize) -> Self {
        Self::Start {
            operation: operation.to_string(),
            total_jobs,
            workers,
        }
    }

    pub fn job_start(job: &Job) -> Self {
        Self::JobStart {
            job_id: job.id().to_string(),
            input: job.config().input_path.clone(),
            output: job.config().output_path.clone(),
        }
    }

    pub fn progress(job_id: JobId, update: &ProgressUpdate) -> Self {
        Self::Progress {
            job_id: job_id.to_string(),
            percent: update.percent,
            speed: update.speed.clone(),
            eta_seconds: update.eta.map(|d| d.as_secs_f64()),
        }
    }

    pub fn job_complete(job: &Job) -> Self {
        Self::JobComplete {
            job_id: job.id().to_string(),
            status: job.status(),
            output: job.config().output_path.clone(),
            duration_seconds: job.elapsed().map(|d| d.as_secs_f64()),
            error: job.error().map(str::to_string),
        }
    }

    pub fn pipeline_step(pipeline: &str, step: &str, index: usize, total: usize) -> Self {
        Self::PipelineStep {
            pipeline: pipeline.to_string(),
            step: step.to_string(),
            index,
            total,
        }
    }

    pub fn complete(stats: &BatchStats, duration_seconds: f64) -> Self {
        Self::Complete {
            total: stats.total,
            completed: stats.completed,
            failed: stats.failed,
            not_run: stats.pending,
            total_input_size: stats.total_input_size,
            total_output_size: stats.total_output_size,
            duration_seconds,
        }
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::Error {
            message: message.into(),
            details,
        }
    }
}
