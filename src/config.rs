//! # Configuration Management Module
//!
//! Questo modulo gestisce la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri del transcoder
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `ffmpeg_path`: Percorso esplicito di ffmpeg (default: None = ricerca automatica)
//! - `ffprobe_path`: Percorso esplicito di ffprobe (default: None = ricerca automatica)
//! - `temp_dir`: Radice delle directory temporanee delle pipeline (default: `<tmp>/transcoder`)
//! - `workers`: Numero di worker paralleli della coda (default: 4)
//! - `json_output`: Eventi JSON su stdout invece della progress bar (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     workers: 8,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Explicit ffmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary
    pub ffprobe_path: Option<PathBuf>,
    /// Root for per-run pipeline scratch directories
    pub temp_dir: PathBuf,
    /// Number of parallel queue workers
    pub workers: usize,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            temp_dir: std::env::temp_dir().join("transcoder"),
            workers: 4,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        if self.temp_dir.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Temporary directory must not be empty"));
        }

        for (name, path) in [("ffmpeg", &self.ffmpeg_path), ("ffprobe", &self.ffprobe_path)] {
            if let Some(path) = path {
                if path.is_dir() {
                    return Err(anyhow::anyhow!("{} path is a directory: {}", name, path.display()));
                }
            }
        }

        Ok(())
    }

    /// Default location of the config file (`<config dir>/media-transcoder/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-transcoder").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.workers = 0;
        assert!(config.validate().is_err());

        config.workers = 2;
        config.temp_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let dir = TempDir::new().unwrap();
        config.temp_dir = dir.path().to_path_buf();
        config.ffmpeg_path = Some(dir.path().to_path_buf());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.workers, 4);
        assert!(config.ffmpeg_path.is_none());
        assert!(config.temp_dir.ends_with("transcoder"));
        assert!(!config.json_output);
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            ffmpeg_path: Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")),
            ffprobe_path: None,
            temp_dir: temp_dir.path().join("scratch"),
            workers: 8,
            json_output: true,
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config, original_config);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults_and_partial_file_fills_in() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.json");
        assert_eq!(Config::from_file(&missing).await.unwrap(), Config::default());

        let partial = temp_dir.path().join("partial.json");
        tokio::fs::write(&partial, r#"{"workers": 2}"#).await.unwrap();
        let config = Config::from_file(&partial).await.unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.temp_dir, Config::default().temp_dir);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"workers": 0}"#).unwrap();
        assert!(tokio_test::block_on(Config::from_file(&path)).is_err());

        std::fs::write(&path, "not json").unwrap();
        assert!(tokio_test::block_on(Config::from_file(&path)).is_err());
    }
}
