//! # Engine Module
//!
//! Confine verso il motore esterno di transcodifica.
//!
//! ## Responsabilità:
//! - Trait `Engine`: esecuzione di un vettore di argomenti con cancellazione
//!   e canale laterale di progresso, più probe dei metadati
//! - `FfmpegEngine`: implementazione basata su processi `ffmpeg` / `ffprobe`
//!
//! ## Esecuzione:
//! 1. Avvia il processo con `tokio::process` (stdin/stdout chiusi, stderr in pipe)
//! 2. Legge stderr spezzando su `\r` e `\n` e passa ogni riga al `ProgressTracker`
//! 3. Conserva le ultime righe di stderr per il messaggio di errore
//! 4. Alla cancellazione termina il processo e restituisce `Cancelled`

use crate::config::Config;
use crate::error::{Result, TranscodeError};
use crate::media_info::MediaInfo;
use crate::tool_resolver::ToolPathResolver;
use crate::transcoder::ProgressTracker;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const STDERR_TAIL_LINES: usize = 20;

/// The external transcoding engine
#[async_trait]
pub trait Engine: Send + Sync {
    /// Run one invocation to completion, failure or cancellation
    async fn execute(
        &self,
        args: &[String],
        cancel: &CancellationToken,
        progress: Option<&ProgressTracker>,
    ) -> Result<()>;

    /// Structured metadata for a media file
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;
}

/// `ffmpeg` / `ffprobe` process engine
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries from the configuration, bundled tools or `PATH`
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = ToolPathResolver::new();
        let ffmpeg = resolver.resolve_or_configured("ffmpeg", config.ffmpeg_path.as_deref())?;
        let ffprobe = resolver.resolve_or_configured("ffprobe", config.ffprobe_path.as_deref())?;
        debug!("🔧 Using ffmpeg at {:?}, ffprobe at {:?}", ffmpeg, ffprobe);
        Ok(Self::new(ffmpeg, ffprobe))
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg
    }

    pub fn ffprobe_path(&self) -> &Path {
        &self.ffprobe
    }

    /// Check that both binaries start (`-version`)
    pub async fn check_available(&self) -> Result<()> {
        for tool in [&self.ffmpeg, &self.ffprobe] {
            let status = Command::new(tool)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| spawn_error(tool, e))?;

            if !status.success() {
                return Err(TranscodeError::MissingDependency(format!(
                    "{} -version exited with {}",
                    tool.display(),
                    status
                )));
            }
        }
        Ok(())
    }
}

fn tool_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn spawn_error(tool: &Path, err: std::io::Error) -> TranscodeError {
    if err.kind() == ErrorKind::NotFound {
        TranscodeError::MissingDependency(format!("{} not found", tool.display()))
    } else {
        TranscodeError::Io(err)
    }
}

fn exit_error(tool: &Path, status: ExitStatus, tail: &[String]) -> TranscodeError {
    let message = if tail.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, tail.join("\n"))
    };
    TranscodeError::tool_failed(tool_name(tool), message)
}

#[async_trait]
impl Engine for FfmpegEngine {
    async fn execute(
        &self,
        args: &[String],
        cancel: &CancellationToken,
        progress: Option<&ProgressTracker>,
    ) -> Result<()> {
        debug!("🎬 {} {}", self.ffmpeg.display(), args.join(" "));

        if cancel.is_cancelled() {
            return Err(TranscodeError::Cancelled);
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.ffmpeg, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscodeError::tool_failed(tool_name(&self.ffmpeg), "stderr not captured"))?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            finished = async { tokio::join!(drain_stderr(stderr, progress), child.wait()) } => Some(finished),
        };

        let (tail, status) = match outcome {
            Some(finished) => finished,
            None => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", self.ffmpeg.display(), e);
                }
                return Err(TranscodeError::Cancelled);
            }
        };

        let status = status?;
        if status.success() {
            Ok(())
        } else {
            Err(exit_error(&self.ffmpeg, status, &tail))
        }
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        debug!("Probing {}", path.display());

        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&self.ffprobe, e))?;

        if !output.status.success() {
            return Err(TranscodeError::Probe(format!(
                "{} exited with {} for {}",
                tool_name(&self.ffprobe),
                output.status,
                path.display()
            )));
        }

        MediaInfo::from_json(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Splits a byte stream into lines on `\r` or `\n`, dropping empty ones
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in bytes {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.take() {
                    lines.push(line);
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    fn take(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Periodic `frame=` / `size=` status output, kept out of diagnostics
fn is_status_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("frame=") || line.starts_with("size=")
}

/// Feed stderr to the tracker and return its last non-status lines
async fn drain_stderr(mut stderr: ChildStderr, progress: Option<&ProgressTracker>) -> Vec<String> {
    let mut splitter = LineSplitter::default();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut chunk = [0u8; 4096];

    let mut handle = |line: String| {
        if let Some(tracker) = progress {
            tracker.parse_line(&line);
        }
        if is_status_line(&line) {
            return;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    };

    loop {
        let n = match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("stderr read failed: {}", e);
                break;
            }
        };
        for line in splitter.feed(&chunk[..n]) {
            handle(line);
        }
    }

    if let Some(line) = splitter.take() {
        handle(line);
    }

    tail.into_iter().collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::default();
        let mut lines = splitter.feed(b"Input #0\nframe=1 time=00:00:01.00\rframe=2 tim");
        lines.extend(splitter.feed(b"e=00:00:02.00\r\n"));
        assert_eq!(
            lines,
            vec!["Input #0", "frame=1 time=00:00:01.00", "frame=2 time=00:00:02.00"]
        );
        assert!(splitter.take().is_none());
    }

    #[test]
    fn test_splitter_flushes_unterminated_line() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.feed(b"last line").is_empty());
        assert_eq!(splitter.take().as_deref(), Some("last line"));
    }

    #[test]
    fn test_exit_error_carries_tail() {
        let err = TranscodeError::tool_failed(
            tool_name(Path::new("/usr/bin/ffmpeg")),
            "exit status: 1: No such file",
        );
        assert_eq!(err.to_string(), "ffmpeg failed: exit status: 1: No such file");
    }

    #[tokio::test]
    async fn test_missing_binary_is_missing_dependency() {
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg-xyz", "/nonexistent/ffprobe-xyz");
        let cancel = CancellationToken::new();
        let err = engine.execute(&["-version".to_string()], &cancel, None).await.unwrap_err();
        assert!(matches!(err, TranscodeError::MissingDependency(_)));

        let err = engine.check_available().await.unwrap_err();
        assert!(matches!(err, TranscodeError::MissingDependency(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_spawn() {
        let engine = FfmpegEngine::new("/nonexistent/ffmpeg-xyz", "/nonexistent/ffprobe-xyz");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.execute(&[], &cancel, None).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_status_lines_are_recognised() {
        assert!(is_status_line("frame=  120 fps=30 time=00:00:04.00 speed=1.0x"));
        assert!(is_status_line("size=    512kB time=00:00:10.00 bitrate= 419.4kbits/s"));
        assert!(!is_status_line("Error while decoding stream #0:0"));
    }

    #[cfg(unix)]
    fn shell_engine() -> FfmpegEngine {
        FfmpegEngine::new("/bin/sh", "/bin/sh")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_failure_feeds_tracker_and_keeps_diagnostic_tail() {
        use std::sync::Arc;

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::new(move |update| sink.lock().push(update.percent));
        tracker.set_duration(std::time::Duration::from_secs(120));

        let script = "printf 'frame=1 time=00:00:30.00 speed=2.0x\\rframe=2 time=00:01:00.00 speed=2.0x\\nError: boom\\n' >&2; exit 3";
        let args = vec!["-c".to_string(), script.to_string()];
        let err = shell_engine()
            .execute(&args, &CancellationToken::new(), Some(&tracker))
            .await
            .unwrap_err();

        assert_eq!(*seen.lock(), vec![Some(25.0), Some(50.0)]);
        match err {
            TranscodeError::ToolFailed { tool, message } => {
                assert_eq!(tool, "sh");
                assert!(message.ends_with(": Error: boom"), "unexpected message: {}", message);
                assert!(!message.contains("frame="));
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_success() {
        let args = vec!["-c".to_string(), "printf 'done\\n' >&2".to_string()];
        shell_engine()
            .execute(&args, &CancellationToken::new(), None)
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_running_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let args = vec!["-c".to_string(), "sleep 30".to_string()];
        let err = shell_engine().execute(&args, &cancel, None).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
