//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file media e i percorsi di output dei batch.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di file media in directory (`walkdir`)
//! - Determinazione tipo file (video vs audio) dall'estensione
//! - Calcolo del percorso di output di un batch, preservando le sottodirectory
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Video**: MP4, MOV, AVI, MKV, WebM, FLV, WMV, M4V, TS
//! - **Audio**: MP3, M4A, AAC, FLAC, WAV, OGG, Opus
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_media_files(Path::new("/path/to/media"))?;
//! for file in files {
//!     let out = FileManager::batch_output_path(&file, input_root, output_root, Some("mp4"))?;
//! }
//! ```

use crate::error::{Result, TranscodeError};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv", "wmv", "m4v", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "wav", "ogg", "opus"];

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    pub async fn get_file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Find all supported media files under `media_dir`, sorted by path
    pub fn find_media_files(media_dir: &Path) -> Result<Vec<PathBuf>> {
        if !media_dir.is_dir() {
            return Err(TranscodeError::InvalidInput(format!(
                "not a directory: {}",
                media_dir.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(media_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| Self::is_supported_format(path))
            .collect();

        files.sort();
        Ok(files)
    }

    fn extension(path: &Path) -> Option<String> {
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub fn is_supported_format(path: &Path) -> bool {
        Self::is_video(path) || Self::is_audio(path)
    }

    pub fn is_video(path: &Path) -> bool {
        Self::extension(path).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn is_audio(path: &Path) -> bool {
        Self::extension(path).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Mirror `input` (found under `input_root`) into `output_root`,
    /// optionally replacing its extension
    pub fn batch_output_path(
        input: &Path,
        input_root: &Path,
        output_root: &Path,
        extension: Option<&str>,
    ) -> Result<PathBuf> {
        let relative = input.strip_prefix(input_root).map_err(|_| {
            TranscodeError::InvalidInput(format!(
                "{} is not inside {}",
                input.display(),
                input_root.display()
            ))
        })?;

        let mut output = output_root.join(relative);
        if let Some(ext) = extension {
            output.set_extension(ext);
        }
        Ok(output)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
