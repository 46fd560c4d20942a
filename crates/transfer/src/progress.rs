use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::JobState;

/// Byte-moving phase of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Compressing,
    Transferring,
    Verifying,
}

impl Phase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compressing => "compressing",
            Self::Transferring => "transferring",
            Self::Verifying => "verifying",
        }
    }
}

/// Events emitted by the pipeline while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A job is about to start. `index` is 1-based.
    JobStarted {
        index: usize,
        total: usize,
        file: String,
    },
    /// A byte-moving phase started; `total` is the expected byte count.
    PhaseStarted {
        file: String,
        phase: Phase,
        total: u64,
    },
    /// Bytes moved so far in the current phase.
    Bytes {
        file: String,
        phase: Phase,
        done: u64,
        total: u64,
    },
    /// A local file was removed (or could not be).
    Cleanup {
        file: String,
        path: PathBuf,
        removed: bool,
    },
    /// A job reached its terminal state.
    JobFinished {
        file: String,
        state: JobState,
        bytes: u64,
    },
}

/// Receives [`ProgressEvent`]s. Implementations must not block for long:
/// they run inline with the copy loop.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records `bytes` moved at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.lock();
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.lock();
        if s.samples.len() < 2 {
            return 0.0;
        }

        let first = &s.samples[0];
        let last = &s.samples[s.samples.len() - 1];
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total_bytes: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to move `remaining_bytes`, `None` while the speed is unknown.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        self.lock().samples.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SpeedInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
