//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore della libreria.
//!
//! ## Responsabilità:
//! - Definisce `TranscodeError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining (errori dei singoli step di una pipeline)
//!
//! ## Categorie di errori:
//! - `Validation`: Configurazione non valida, rilevata prima dell'esecuzione
//! - `ToolFailed` / `Cancelled`: Errori di esecuzione del motore esterno
//! - `Workspace`: Errori di ciclo di vita della directory temporanea o dello
//!   spostamento dell'artefatto finale
//! - `Step`: Errore di uno step di pipeline, con nome e posizione dello step
//!
//! ## Esempio:
//! ```rust,ignore
//! if !tool_exists {
//!     return Err(TranscodeError::MissingDependency("ffmpeg".to_string()));
//! }
//! ```

use crate::validation::ValidationErrors;

/// Result type alias using [`TranscodeError`].
pub type Result<T> = std::result::Result<T, TranscodeError>;

/// Custom error types for transcoding
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("probe failed: {0}")]
    Probe(String),

    #[error("execution cancelled")]
    Cancelled,

    #[error("step {position}/{total} '{step}' failed: {source}")]
    Step {
        step: String,
        /// 1-based position of the step in its pipeline
        position: usize,
        total: usize,
        #[source]
        source: Box<TranscodeError>,
    },

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

impl TranscodeError {
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Wrap an error with the name and position of the pipeline step that produced it.
    pub fn in_step(step: impl Into<String>, position: usize, total: usize, source: TranscodeError) -> Self {
        Self::Step {
            step: step.into(),
            position,
            total,
            source: Box::new(source),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_names_the_step() {
        let err = TranscodeError::in_step("transcode", 2, 3, TranscodeError::tool_failed("ffmpeg", "exit status: 1"));
        assert_eq!(err.to_string(), "step 2/3 'transcode' failed: ffmpeg failed: exit status: 1");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_cancelled_seen_through_step() {
        let err = TranscodeError::in_step("filter", 1, 1, TranscodeError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!TranscodeError::Probe("x".into()).is_cancelled());
    }
}
