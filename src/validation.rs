//! # Validation Module
//!
//! Validazione di `TranscodeConfig` prima che un job venga creato.
//! Raccoglie tutti gli errori di campo invece di fermarsi al primo.

use crate::job::TranscodeConfig;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

const VIDEO_CODECS: &[&str] = &[
    "libx264", "libx265", "libvpx", "libvpx-vp9", "libaom-av1", "libsvtav1",
    "h264", "hevc", "vp8", "vp9", "av1", "copy",
];

const AUDIO_CODECS: &[&str] = &[
    "aac", "libmp3lame", "libopus", "libvorbis", "flac",
    "mp3", "opus", "vorbis", "pcm_s16le", "copy",
];

const MAX_WIDTH: u32 = 7680;
const MAX_HEIGHT: u32 = 4320;
const MIN_DIMENSION: u32 = 64;
const MAX_FRAME_RATE: f64 = 120.0;
const MAX_CRF: u8 = 51;

/// A single invalid field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

/// All invalid fields of one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn has_errors(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(ValidationError {
            field,
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl TranscodeConfig {
    /// Validate paths and encoding parameters
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.input_path.as_os_str().is_empty() {
            errors.push("input_path", "input path must not be empty");
        } else if !self.input_path.exists() {
            errors.push(
                "input_path",
                format!("file '{}' does not exist", self.input_path.display()),
            );
        }

        if self.output_path.as_os_str().is_empty() {
            errors.push("output_path", "output path must not be empty");
        } else {
            let parent = self.output_path.parent().unwrap_or(Path::new(""));
            // a bare file name lands in the working directory
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                errors.push(
                    "output_path",
                    format!("directory '{}' does not exist", parent.display()),
                );
            }
        }

        if let Some(ref codec) = self.video_codec {
            if !VIDEO_CODECS.contains(&codec.as_str()) {
                errors.push("video_codec", format!("unsupported video codec '{}'", codec));
            }
        }

        if let Some(ref codec) = self.audio_codec {
            if !AUDIO_CODECS.contains(&codec.as_str()) {
                errors.push("audio_codec", format!("unsupported audio codec '{}'", codec));
            }
        }

        if let Some(ref bitrate) = self.video_bitrate {
            if let Err(message) = validate_bitrate(bitrate) {
                errors.push("video_bitrate", message);
            }
        }

        if let Some(ref bitrate) = self.audio_bitrate {
            if let Err(message) = validate_bitrate(bitrate) {
                errors.push("audio_bitrate", message);
            }
        }

        if let Some(ref resolution) = self.resolution {
            if let Err(message) = validate_resolution(resolution) {
                errors.push("resolution", message);
            }
        }

        if let Some(ref frame_rate) = self.frame_rate {
            if let Err(message) = validate_frame_rate(frame_rate) {
                errors.push("frame_rate", message);
            }
        }

        if let Some(quality) = self.quality {
            if quality > MAX_CRF {
                errors.push(
                    "quality",
                    format!("quality {} out of range (0-{})", quality, MAX_CRF),
                );
            }
        }

        if errors.has_errors() {
            Err(errors)
        } else {
            Ok(())
        }
    }
}

fn bitrate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)([kKmM]?)$").expect("valid bitrate regex"))
}

fn resolution_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+)$").expect("valid resolution regex"))
}

fn validate_bitrate(bitrate: &str) -> Result<(), String> {
    let caps = bitrate_regex().captures(bitrate).ok_or_else(|| {
        format!("invalid bitrate '{}' (use e.g. 1000k, 2M, 128)", bitrate)
    })?;

    match caps[1].parse::<u64>() {
        Ok(value) if value > 0 => Ok(()),
        _ => Err(format!("invalid bitrate value '{}'", bitrate)),
    }
}

fn validate_resolution(resolution: &str) -> Result<(), String> {
    let caps = resolution_regex().captures(resolution).ok_or_else(|| {
        format!("invalid resolution '{}' (use e.g. 1920x1080)", resolution)
    })?;

    let (width, height) = match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(format!("invalid resolution values '{}'", resolution)),
    };

    if width > MAX_WIDTH || height > MAX_HEIGHT {
        return Err(format!(
            "resolution '{}' too large (max {}x{})",
            resolution, MAX_WIDTH, MAX_HEIGHT
        ));
    }

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(format!(
            "resolution '{}' too small (min {}x{})",
            resolution, MIN_DIMENSION, MIN_DIMENSION
        ));
    }

    Ok(())
}

fn validate_frame_rate(frame_rate: &str) -> Result<(), String> {
    let rate: f64 = frame_rate
        .parse()
        .map_err(|_| format!("invalid frame rate '{}'", frame_rate))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err("frame rate must be positive".to_string());
    }

    if rate > MAX_FRAME_RATE {
        return Err(format!(
            "frame rate '{}' too high (max {})",
            frame_rate, MAX_FRAME_RATE
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config(dir: &TempDir) -> TranscodeConfig {
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, b"data").unwrap();
        TranscodeConfig::new(input, dir.path().join("output.mp4"))
    }

    #[test]
    fn test_valid_config() {
        let dir = TempDir::new().unwrap();
        let config = TranscodeConfig {
            video_codec: Some("libx264".into()),
            audio_codec: Some("aac".into()),
            video_bitrate: Some("2500k".into()),
            audio_bitrate: Some("128".into()),
            resolution: Some("1280x720".into()),
            frame_rate: Some("29.97".into()),
            quality: Some(23),
            ..valid_config(&dir)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_paths() {
        let config = TranscodeConfig::default();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["input_path", "output_path"]);

        let config = TranscodeConfig::new("/definitely/not/here.mp4", "/no/such/dir/out.mp4");
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.fields(), vec!["input_path", "output_path"]);
    }

    #[test]
    fn test_bare_output_file_name_is_accepted() {
        let dir = TempDir::new().unwrap();
        let config = TranscodeConfig {
            output_path: "out.mp4".into(),
            ..valid_config(&dir)
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collects_all_field_errors() {
        let dir = TempDir::new().unwrap();
        let config = TranscodeConfig {
            video_codec: Some("divx".into()),
            audio_codec: Some("wma".into()),
            video_bitrate: Some("fast".into()),
            audio_bitrate: Some("0k".into()),
            resolution: Some("32x32".into()),
            frame_rate: Some("240".into()),
            quality: Some(60),
            ..valid_config(&dir)
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![
                "video_codec",
                "audio_codec",
                "video_bitrate",
                "audio_bitrate",
                "resolution",
                "frame_rate",
                "quality"
            ]
        );
        assert!(errors.to_string().contains("unsupported video codec 'divx'"));
    }

    #[test]
    fn test_resolution_bounds() {
        assert!(validate_resolution("7680x4320").is_ok());
        assert!(validate_resolution("64x64").is_ok());
        assert!(validate_resolution("7681x4320").is_err());
        assert!(validate_resolution("1920*1080").is_err());
        assert!(validate_resolution("0x100").is_err());
    }

    #[test]
    fn test_frame_rate_bounds() {
        assert!(validate_frame_rate("120").is_ok());
        assert!(validate_frame_rate("0").is_err());
        assert!(validate_frame_rate("-24").is_err());
        assert!(validate_frame_rate("abc").is_err());
    }
}
