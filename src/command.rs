//! # Command Construction Module
//!
//! Costruisce i vettori di argomenti per FFmpeg a partire da `TranscodeConfig`.
//!
//! ## Responsabilità:
//! - Argomenti di transcodifica (codec, bitrate, risoluzione, filtri, formato)
//! - Argomenti per l'estrazione di una singola miniatura
//! - Codec di default per formato contenitore
//!
//! ## Ordine degli argomenti:
//! ```text
//! -hide_banner -i <in> -y [-vf ..] [-af ..] [-c:v ..|-vn] [-c:a ..]
//! [-b:v ..] [-b:a ..] [-s ..] [-r ..] [-crf ..] [-f ..] <out>
//! ```

use crate::args;
use crate::job::TranscodeConfig;
use crate::utils::path_arg;
use std::path::Path;

/// Codecs chosen for a container when the caller gives none
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCodecs {
    pub video_codec: Option<&'static str>,
    pub audio_codec: &'static str,
    pub audio_bitrate: Option<&'static str>,
}

/// Default codecs for a container format
pub fn codecs_for_format(format: &str) -> FormatCodecs {
    let (video_codec, audio_codec, audio_bitrate) = match format.to_lowercase().as_str() {
        "mp4" => (Some("libx264"), "aac", Some("128k")),
        "webm" => (Some("libvpx-vp9"), "libopus", Some("128k")),
        "avi" => (Some("libx264"), "mp3", Some("192k")),
        "mp3" => (None, "libmp3lame", Some("192k")),
        "m4a" => (None, "aac", Some("128k")),
        "flac" => (None, "flac", None),
        "wav" => (None, "pcm_s16le", None),
        _ => (Some("libx264"), "aac", Some("128k")),
    };

    FormatCodecs {
        video_codec,
        audio_codec,
        audio_bitrate,
    }
}

/// ffmpeg muxer name for a file extension, where the two differ
pub fn muxer_for_format(format: &str) -> &str {
    match format {
        "m4a" => "ipod",
        "mkv" => "matroska",
        other => other,
    }
}

/// Build the full transcode argument vector
pub fn build_transcode_args(config: &TranscodeConfig) -> Vec<String> {
    let mut args = args!["-hide_banner", "-i", path_arg(&config.input_path), "-y"];

    if let Some(vf) = config.filters.video_filter_string() {
        args.extend(args!["-vf", vf]);
    }

    if let Some(af) = config.filters.audio_filter_string() {
        args.extend(args!["-af", af]);
    }

    if config.disable_video {
        args.push("-vn".to_string());
    } else if let Some(ref codec) = config.video_codec {
        args.extend(args!["-c:v", codec]);
    }

    if let Some(ref codec) = config.audio_codec {
        args.extend(args!["-c:a", codec]);
    }

    if !config.disable_video {
        if let Some(ref bitrate) = config.video_bitrate {
            args.extend(args!["-b:v", bitrate]);
        }
    }

    if let Some(ref bitrate) = config.audio_bitrate {
        args.extend(args!["-b:a", bitrate]);
    }

    if !config.disable_video {
        if let Some(ref resolution) = config.resolution {
            args.extend(args!["-s", resolution]);
        }

        if let Some(ref frame_rate) = config.frame_rate {
            args.extend(args!["-r", frame_rate]);
        }

        if let Some(quality) = config.quality {
            args.extend(args!["-crf", quality]);
        }
    }

    if let Some(ref format) = config.format {
        args.extend(args!["-f", muxer_for_format(format)]);
    }

    args.push(path_arg(&config.output_path));
    args
}

/// Grab a single frame at `offset` (ffmpeg time syntax, e.g. `00:00:05`)
pub fn build_thumbnail_args(input: &Path, output: &Path, offset: &str) -> Vec<String> {
    args![
        "-hide_banner",
        "-i",
        path_arg(input),
        "-ss",
        offset,
        "-frames:v",
        "1",
        "-y",
        path_arg(output),
    ]
}
