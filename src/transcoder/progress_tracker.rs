//! # Progress Tracker
//!
//! Converte le righe di stato di FFmpeg (`frame= ... time=HH:MM:SS.hh ... speed=N.NNx`)
//! in osservazioni di progresso, velocità ed ETA consegnate a una callback.
//!
//! Lo stato di sessione è solo la durata attesa e l'istante di creazione:
//! ogni riga viene analizzata indipendentemente, e le righe non riconosciute
//! vengono ignorate senza errori.

use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// One observation derived from a status line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    /// Percentage in `[0, 100]`, only when the total duration is known
    pub percent: Option<f64>,
    /// Speed label such as `2.50x`
    pub speed: Option<String>,
    /// Estimated wall-clock time remaining
    pub eta: Option<Duration>,
    pub frame: Option<u64>,
}

pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

struct Patterns {
    time: Regex,
    speed: Regex,
    frame: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        time: Regex::new(r"time=(\d{2}):(\d{2}):(\d{2})\.(\d{2})").expect("valid time regex"),
        speed: Regex::new(r"speed=\s*([\d.]+)x").expect("valid speed regex"),
        frame: Regex::new(r"frame=\s*(\d+)").expect("valid frame regex"),
    })
}

/// Parses engine status lines into [`ProgressUpdate`]s
pub struct ProgressTracker {
    callback: ProgressCallback,
    /// Expected media duration in microseconds, 0 = unknown
    total_duration_us: AtomicU64,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(callback: impl Fn(ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self::started_at(Instant::now(), callback)
    }

    /// Tracker whose wall-clock reference is `started`
    pub fn started_at(started: Instant, callback: impl Fn(ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            total_duration_us: AtomicU64::new(0),
            started,
        }
    }

    /// Set the expected media duration. Zero means unknown.
    pub fn set_duration(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.total_duration_us.store(micros, Ordering::Relaxed);
    }

    pub fn duration(&self) -> Option<Duration> {
        match self.total_duration_us.load(Ordering::Relaxed) {
            0 => None,
            micros => Some(Duration::from_micros(micros)),
        }
    }

    /// Parse one status line, invoking the callback if it carried progress or speed
    pub fn parse_line(&self, line: &str) {
        if let Some(update) = self.observe(line, self.started.elapsed()) {
            (self.callback)(update);
        }
    }

    fn observe(&self, line: &str, wall_elapsed: Duration) -> Option<ProgressUpdate> {
        let patterns = patterns();

        let percent = patterns.time.captures(line).and_then(|caps| {
            let field = |i: usize| caps[i].parse::<u64>().unwrap_or(0);
            let media_time = Duration::from_secs(field(1) * 3600 + field(2) * 60 + field(3))
                + Duration::from_millis(field(4) * 10);

            let total = self.duration()?;
            Some((media_time.as_secs_f64() / total.as_secs_f64() * 100.0).min(100.0))
        });

        let speed_caps = patterns.speed.captures(line);
        let speed = speed_caps.as_ref().map(|caps| format!("{}x", &caps[1]));
        let speed_value = speed_caps
            .as_ref()
            .and_then(|caps| caps[1].parse::<f64>().ok())
            .filter(|s| *s > 0.0);

        let eta = match (speed_value, percent) {
            (Some(_), Some(progress)) if progress > 0.0 => {
                let total_estimated = wall_elapsed.as_secs_f64() * 100.0 / progress;
                Some(Duration::from_secs_f64(
                    (total_estimated - wall_elapsed.as_secs_f64()).max(0.0),
                ))
            }
            _ => None,
        };

        let frame = patterns
            .frame
            .captures(line)
            .and_then(|caps| caps[1].parse::<u64>().ok());

        let has_progress = percent.is_some_and(|p| p > 0.0);
        if !has_progress && speed.is_none() {
            return None;
        }

        Some(ProgressUpdate {
            percent,
            speed,
            eta,
            frame,
        })
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("duration", &self.duration())
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording_tracker() -> (ProgressTracker, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::new(move |update| sink.lock().push(update));
        (tracker, seen)
    }

    #[test]
    fn test_half_way_through() {
        let (tracker, seen) = recording_tracker();
        tracker.set_duration(Duration::from_secs(120));
        tracker.parse_line("frame= 1440 fps= 48 q=28.0 size=  2048kB time=00:01:00.00 bitrate= 279.6kbits/s");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].percent, Some(50.0));
        assert_eq!(seen[0].frame, Some(1440));
        assert_eq!(seen[0].speed, None);
        assert_eq!(seen[0].eta, None);
    }

    #[test]
    fn test_irrelevant_line_is_silent() {
        let (tracker, seen) = recording_tracker();
        tracker.set_duration(Duration::from_secs(120));
        tracker.parse_line("Stream #0:0: Video: h264 (High), yuv420p, 1920x1080");
        tracker.parse_line("");
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_speed_without_time() {
        let (tracker, seen) = recording_tracker();
        tracker.parse_line("size=N/A speed=2.00x");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].speed.as_deref(), Some("2.00x"));
        assert_eq!(seen[0].percent, None);
        assert_eq!(seen[0].eta, None);
    }

    #[test]
    fn test_unknown_duration_suppresses_percent() {
        let (tracker, seen) = recording_tracker();
        tracker.parse_line("time=00:00:10.00");
        assert!(seen.lock().is_empty());
        assert_eq!(tracker.duration(), None);
    }

    #[test]
    fn test_progress_capped_at_100() {
        let (tracker, seen) = recording_tracker();
        tracker.set_duration(Duration::from_secs(10));
        tracker.parse_line("time=00:00:12.50 speed=1.0x");
        assert_eq!(seen.lock()[0].percent, Some(100.0));
    }

    #[test]
    fn test_eta_from_wall_clock() {
        let tracker = ProgressTracker::new(|_| {});
        tracker.set_duration(Duration::from_secs(100));

        // 25% done after 10s of wall time -> 40s total -> 30s left
        let update = tracker
            .observe("time=00:00:25.00 speed=2.5x", Duration::from_secs(10))
            .unwrap();
        assert_eq!(update.percent, Some(25.0));
        assert_eq!(update.speed.as_deref(), Some("2.5x"));
        let eta = update.eta.unwrap();
        assert!((eta.as_secs_f64() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_speed_gives_no_eta() {
        let tracker = ProgressTracker::new(|_| {});
        tracker.set_duration(Duration::from_secs(100));
        let update = tracker
            .observe("time=00:00:25.00 speed=0x", Duration::from_secs(10))
            .unwrap();
        assert_eq!(update.speed.as_deref(), Some("0x"));
        assert_eq!(update.eta, None);
    }

    #[test]
    fn test_duration_can_change_mid_stream() {
        let (tracker, seen) = recording_tracker();
        tracker.parse_line("time=00:00:30.00");
        tracker.set_duration(Duration::from_secs(60));
        tracker.parse_line("time=00:00:30.00");
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].percent, Some(50.0));
    }
}
