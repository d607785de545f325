//! # Transcoder Module
//!
//! Nucleo di esecuzione: job singoli, coda concorrente e pipeline multi-step.
//!
//! ## Architettura:
//! - `Transcoder`: facciata su un `Engine` (creazione ed esecuzione job)
//! - `ProgressTracker`: parsing delle righe di stato del motore
//! - `Queue`: pool di worker che consuma i job in ordine FIFO
//! - `Pipeline` + `steps`: catene di trasformazioni con scratch dir privata

pub mod media_transcoder;
pub mod pipeline;
pub mod progress_tracker;
pub mod queue;
pub mod steps;

pub use media_transcoder::Transcoder;
pub use pipeline::{
    archive_pipeline, mobile_pipeline, preset_pipeline, web_optimization_pipeline, Pipeline, PipelineStep,
    StepContext, StepObserver,
};
pub use progress_tracker::{ProgressCallback, ProgressTracker, ProgressUpdate};
pub use queue::Queue;
pub use steps::{AnalyzeStep, ExtractAudioStep, FilterStep, ThumbnailStep, TranscodeStep};
