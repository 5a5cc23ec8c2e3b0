//! ReplaySource - replays recorded ticks from a JSON-lines file
//!
//! One `TelemetryTick` object per line. Blank lines and `#` comments are
//! skipped; malformed lines are counted and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{TelemetryCallback, TelemetrySource, TelemetryTick};
use tracing::{debug, info, warn};

use crate::error::{IngestionError, Result};

/// Longest wall-clock pause between two replayed ticks
const MAX_REPLAY_SLEEP: Duration = Duration::from_secs(5);

pub struct ReplaySource {
    source_id: String,
    path: PathBuf,
    /// Playback speed relative to tick time (0 = as fast as possible)
    speed: f64,
    listening: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    replayed: Arc<AtomicU64>,
    parse_errors: Arc<AtomicU64>,
}

impl ReplaySource {
    /// Open a replay file; fails early if it cannot be read
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        File::open(&path).map_err(|source| IngestionError::ReplayOpen {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            source_id: format!("replay:{}", path.display()),
            path,
            speed: 0.0,
            listening: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
            replayed: Arc::new(AtomicU64::new(0)),
            parse_errors: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Replay at `speed`× tick time (0 disables pacing)
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            0.0
        };
        self
    }

    pub fn replayed(&self) -> u64 {
        self.replayed.load(Ordering::Relaxed)
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }
}

/// Wall-clock pause between two ticks at the given speed multiplier
///
/// `None` when pacing is off or time does not advance; gaps too large to
/// represent are capped like any other long gap.
fn replay_delay(last: f64, next: f64, speed: f64) -> Option<Duration> {
    if !(speed > 0.0) {
        return None;
    }
    let dt = (next - last) / speed;
    if !(dt > 0.0) {
        return None;
    }
    Some(
        Duration::try_from_secs_f64(dt)
            .unwrap_or(MAX_REPLAY_SLEEP)
            .min(MAX_REPLAY_SLEEP),
    )
}

/// Parse one replay line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<TelemetryTick>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| IngestionError::ParseFailed {
            line: line_no,
            message: e.to_string(),
        })
}

impl TelemetrySource for ReplaySource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: TelemetryCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let path = self.path.clone();
        let speed = self.speed;
        let listening = self.listening.clone();
        let finished = self.finished.clone();
        let replayed = self.replayed.clone();
        let parse_errors = self.parse_errors.clone();

        std::thread::spawn(move || {
            let reader = match File::open(&path) {
                Ok(file) => BufReader::new(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "replay file vanished");
                    finished.store(true, Ordering::SeqCst);
                    return;
                }
            };

            debug!(path = %path.display(), speed, "replay started");
            let mut last_timestamp: Option<f64> = None;

            for (idx, line) in reader.lines().enumerate() {
                if !listening.load(Ordering::Relaxed) {
                    break;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "replay read failed");
                        break;
                    }
                };

                let tick = match parse_line(&line, idx + 1) {
                    Ok(Some(tick)) => tick,
                    Ok(None) => continue,
                    Err(e) => {
                        parse_errors.fetch_add(1, Ordering::Relaxed);
                        metrics::counter!("fuel_replay_parse_errors_total").increment(1);
                        warn!(path = %path.display(), error = %e, "skipping malformed tick");
                        continue;
                    }
                };

                if let Some(delay) = last_timestamp
                    .and_then(|last| replay_delay(last, tick.timestamp, speed))
                {
                    std::thread::sleep(delay);
                }
                last_timestamp = Some(tick.timestamp);

                callback(tick);
                replayed.fetch_add(1, Ordering::Relaxed);
            }

            info!(
                path = %path.display(),
                replayed = replayed.load(Ordering::Relaxed),
                parse_errors = parse_errors.load(Ordering::Relaxed),
                "replay finished"
            );
            finished.store(true, Ordering::SeqCst);
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}
