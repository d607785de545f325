//! # Presets Module
//!
//! Catalogo di configurazioni predefinite (web, streaming, archivio, audio).
//! Ogni preset è un template di `TranscodeConfig` senza percorsi: si
//! applica con `TranscodeConfig::with_paths`.

use crate::error::{Result, TranscodeError};
use crate::job::TranscodeConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PresetCategory {
    Web,
    HighQuality,
    Streaming,
    Audio,
    Specialized,
}

impl PresetCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::Web => "Web & mobile",
            Self::HighQuality => "High quality",
            Self::Streaming => "Streaming",
            Self::Audio => "Audio",
            Self::Specialized => "Specialized",
        }
    }

    pub const ALL: [PresetCategory; 5] = [
        Self::Web,
        Self::HighQuality,
        Self::Streaming,
        Self::Audio,
        Self::Specialized,
    ];
}

#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub category: PresetCategory,
    pub config: TranscodeConfig,
}

fn video(
    codec: &str,
    resolution: Option<&str>,
    video_bitrate: Option<&str>,
    audio_codec: &str,
    audio_bitrate: Option<&str>,
    frame_rate: Option<&str>,
    quality: u8,
) -> TranscodeConfig {
    TranscodeConfig {
        video_codec: Some(codec.to_string()),
        audio_codec: Some(audio_codec.to_string()),
        resolution: resolution.map(str::to_string),
        video_bitrate: video_bitrate.map(str::to_string),
        audio_bitrate: audio_bitrate.map(str::to_string),
        frame_rate: frame_rate.map(str::to_string),
        quality: Some(quality),
        ..Default::default()
    }
}

fn audio(codec: &str, bitrate: &str, format: &str) -> TranscodeConfig {
    TranscodeConfig {
        audio_codec: Some(codec.to_string()),
        audio_bitrate: Some(bitrate.to_string()),
        format: Some(format.to_string()),
        disable_video: true,
        ..Default::default()
    }
}

/// All presets, in display order
pub fn all() -> Vec<Preset> {
    use PresetCategory::*;

    let preset = |name: &'static str,
                  description: &'static str,
                  category: PresetCategory,
                  config: TranscodeConfig| Preset {
        name,
        description,
        category,
        config,
    };

    vec![
        preset("web-hd", "HD for the web (1280x720, H.264)", Web,
            video("libx264", Some("1280x720"), Some("2500k"), "aac", Some("128k"), None, 23)),
        preset("web-sd", "SD for the web (854x480, H.264)", Web,
            video("libx264", Some("854x480"), Some("1000k"), "aac", Some("96k"), None, 25)),
        preset("web-optimized", "1080p for the web with fast start-up", Web, TranscodeConfig {
            format: Some("mp4".to_string()),
            ..video("libx264", Some("1920x1080"), Some("3000k"), "aac", Some("128k"), None, 22)
        }),
        preset("mobile", "Optimized for mobile devices", Web,
            video("libx264", Some("640x360"), Some("500k"), "aac", Some("64k"), None, 28)),
        preset("4k", "4K (3840x2160, H.264)", HighQuality,
            video("libx264", Some("3840x2160"), Some("15000k"), "aac", Some("192k"), None, 20)),
        preset("high-quality", "High quality with H.265", HighQuality,
            video("libx265", Some("1920x1080"), Some("4000k"), "aac", Some("192k"), None, 20)),
        preset("archive", "High quality for archiving", HighQuality,
            video("libx265", None, None, "flac", None, None, 18)),
        preset("twitch", "Optimized for Twitch streaming", Streaming,
            video("libx264", Some("1920x1080"), Some("6000k"), "aac", Some("160k"), Some("60"), 23)),
        preset("youtube", "Optimized for YouTube", Streaming,
            video("libx264", Some("1920x1080"), Some("8000k"), "aac", Some("192k"), Some("30"), 21)),
        preset("gaming", "Optimized for gameplay footage", Streaming,
            video("libx264", Some("1920x1080"), Some("6000k"), "aac", Some("160k"), Some("60"), 21)),
        preset("audio-mp3", "Convert to MP3", Audio, audio("mp3", "192k", "mp3")),
        preset("audio-aac", "Convert to AAC", Audio, audio("aac", "128k", "m4a")),
        preset("podcast", "Optimized for podcasts", Audio, audio("libmp3lame", "128k", "mp3")),
        preset("audiobook-mp3", "Optimized for audiobooks (MP3)", Audio, audio("libmp3lame", "64k", "mp3")),
        preset("audiobook-m4a", "Optimized for audiobooks (M4A)", Audio, audio("aac", "64k", "m4a")),
        preset("animation", "Optimized for animation", Specialized,
            video("libx264", Some("1920x1080"), Some("5000k"), "aac", Some("192k"), Some("24"), 18)),
        preset("fast-encode", "Fast encoding with acceptable quality", Specialized,
            video("libx264", Some("1280x720"), Some("1500k"), "aac", Some("96k"), None, 26)),
        preset("small-size", "Smallest file size", Specialized,
            video("libx265", Some("854x480"), Some("800k"), "aac", Some("64k"), None, 28)),
    ]
}

/// Look up a preset by name
pub fn get(name: &str) -> Result<Preset> {
    all()
        .into_iter()
        .find(|p| p.name == name)
        .ok_or_else(|| TranscodeError::UnknownPreset(name.to_string()))
}

/// Presets grouped by category, in category order
pub fn by_category() -> Vec<(PresetCategory, Vec<Preset>)> {
    let presets = all();
    PresetCategory::ALL
        .iter()
        .map(|&category| {
            let group = presets.iter().filter(|p| p.category == category).cloned().collect();
            (category, group)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_names_unique() {
        let presets = all();
        assert_eq!(presets.len(), 18);
        let names: HashSet<_> = presets.iter().map(|p| p.name).collect();
        assert_eq!(names.len(), presets.len());
    }

    #[test]
    fn test_lookup() {
        let preset = get("twitch").unwrap();
        assert_eq!(preset.config.frame_rate.as_deref(), Some("60"));
        assert_eq!(preset.config.video_bitrate.as_deref(), Some("6000k"));

        assert!(matches!(get("vhs"), Err(TranscodeError::UnknownPreset(_))));
    }

    #[test]
    fn test_every_preset_validates() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.mp4");
        std::fs::write(&input, b"x").unwrap();

        for preset in all() {
            let config = preset.config.with_paths(&input, dir.path().join("out"));
            assert!(config.validate().is_ok(), "preset {} invalid", preset.name);
        }
    }

    #[test]
    fn test_grouping_covers_catalog() {
        let groups = by_category();
        let total: usize = groups.iter().map(|(_, g)| g.len()).sum();
        assert_eq!(total, all().len());
        assert!(groups.iter().all(|(_, g)| !g.is_empty()));
    }
}
