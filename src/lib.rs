//! # Media Transcoder Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione applicativa (percorsi tool, temp dir, worker)
//! - `error`: Tipi di errore custom
//! - `job` / `validation`: Configurazione di un job, stati e validazione
//! - `filters` / `command`: Filtri e costruzione degli argomenti del motore
//! - `engine` / `tool_resolver`: Processo esterno (ffmpeg/ffprobe) e sua risoluzione
//! - `media_info`: Metadati tipizzati da ffprobe
//! - `presets`: Catalogo di preset
//! - `transcoder`: Facciata, coda concorrente, pipeline e progress tracker
//! - `progress` / `json_output`: Feedback da terminale e output JSON
//! - `file_manager`: Discovery dei file media
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use media_transcoder::{Config, Queue, Transcoder};
//!
//! let transcoder = Arc::new(Transcoder::from_config(&Config::default()).await?);
//! let queue = Queue::new(transcoder.clone(), 4);
//! queue.submit(TranscodeConfig::new("in.mov", "out.mp4"))?;
//! queue.start();
//! queue.wait_idle().await;
//! ```

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod filters;
pub mod job;
pub mod json_output;
pub mod media_info;
pub mod presets;
pub mod progress;
pub mod tool_resolver;
pub mod transcoder;
pub mod utils;
pub mod validation;

pub use config::Config;
pub use engine::{Engine, FfmpegEngine};
pub use error::{Result, TranscodeError};
pub use filters::{Filter, FilterChain};
pub use job::{Job, JobId, JobStatus, TranscodeConfig};
pub use media_info::MediaInfo;
pub use transcoder::{Pipeline, PipelineStep, ProgressTracker, ProgressUpdate, Queue, Transcoder};
