//! # Media Information Module
//!
//! Modello tipizzato dell'output JSON di `ffprobe -show_format -show_streams`.
//!
//! ## Responsabilità:
//! - Deserializza formato e stream con `serde`
//! - Converte durata, dimensione e bitrate (stringhe in ffprobe) in valori numerici
//! - Fornisce helper per risoluzione, frame rate, tag e un riepilogo leggibile

use crate::error::{Result, TranscodeError};
use crate::file_manager::FileManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatInfo {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub format_name: String,
    #[serde(default)]
    pub format_long_name: String,
    pub duration: Option<String>,
    pub size: Option<String>,
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub codec_name: String,
    #[serde(default)]
    pub codec_long_name: String,
    #[serde(default)]
    pub codec_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub pix_fmt: Option<String>,
    pub r_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Probe result for one media file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub format: FormatInfo,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// Parse raw `ffprobe -print_format json` output
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| TranscodeError::Probe(format!("unparseable ffprobe output: {}", e)))
    }

    pub fn duration(&self) -> Option<Duration> {
        let seconds: f64 = self.format.duration.as_deref()?.trim().parse().ok()?;
        if seconds.is_finite() && seconds >= 0.0 {
            Some(Duration::from_secs_f64(seconds))
        } else {
            None
        }
    }

    pub fn size(&self) -> Option<u64> {
        self.format.size.as_deref()?.trim().parse().ok()
    }

    pub fn bitrate(&self) -> Option<u64> {
        self.format.bit_rate.as_deref()?.trim().parse().ok()
    }

    pub fn video_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.codec_type == "video")
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(|s| s.codec_type == "audio")
    }

    pub fn has_video(&self) -> bool {
        self.video_streams().next().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_streams().next().is_some()
    }

    /// Audio streams only
    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    /// `WIDTHxHEIGHT` of the first video stream
    pub fn resolution(&self) -> Option<String> {
        let stream = self.video_streams().next()?;
        match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    /// Frame rate of the first video stream, from ffprobe's `num/den` form
    pub fn frame_rate(&self) -> Option<f64> {
        let rate = self.video_streams().next()?.r_frame_rate.as_deref()?;
        let (num, den) = rate.split_once('/')?;
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    }

    pub fn title(&self) -> Option<&str> {
        self.format.tags.get("title").map(String::as_str)
    }

    pub fn artist(&self) -> Option<&str> {
        self.format.tags.get("artist").map(String::as_str)
    }

    /// One-line human-readable description
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.has_video() {
            match (self.resolution(), self.frame_rate()) {
                (Some(res), Some(fps)) if fps > 0.0 => parts.push(format!("Video: {} @ {:.1} fps", res, fps)),
                (Some(res), _) => parts.push(format!("Video: {}", res)),
                _ => parts.push("Video".to_string()),
            }
        }

        if let Some(stream) = self.audio_streams().next() {
            match (&stream.sample_rate, stream.channels) {
                (Some(rate), Some(channels)) if channels > 0 => {
                    parts.push(format!("Audio: {} Hz, {} channels", rate, channels))
                }
                _ => parts.push("Audio".to_string()),
            }
        }

        if let Some(duration) = self.duration().filter(|d| !d.is_zero()) {
            parts.push(format!("Duration: {:.1}s", duration.as_secs_f64()));
        }

        if let Some(size) = self.size().filter(|s| *s > 0) {
            parts.push(format!("Size: {}", FileManager::format_size(size)));
        }

        parts.join(", ")
    }
}
