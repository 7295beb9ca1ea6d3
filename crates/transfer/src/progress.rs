use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receives upload progress as a percentage in `[0, 100]`.
///
/// Reports are monotonically non-decreasing within one upload and the
/// final report of a successful upload is exactly 100.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Discards all reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: f64) {}
}

// ---------------------------------------------------------------------------
// ChunkProgress
// ---------------------------------------------------------------------------

/// Per-chunk progress counter.
///
/// Skipped chunks count as completed, so a resumed upload jumps forward
/// instead of restarting from zero.
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress {
    total: u32,
    completed: u32,
}

impl ChunkProgress {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: 0,
        }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Marks one more chunk complete and returns the new percentage.
    pub fn advance(&mut self) -> f64 {
        if self.completed < self.total {
            self.completed += 1;
        }
        self.percent()
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 || self.completed == self.total {
            return 100.0;
        }
        f64::from(self.completed) / f64::from(self.total) * 100.0
    }
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
    samples: VecDeque<SpeedSample>,
    started: Instant,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 30 s).
    /// - `max_samples`: maximum retained samples (default 64).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                started: Instant::now(),
                max_samples: max_samples.unwrap_or(64),
                window_size: window_size.unwrap_or(Duration::from_secs(30)),
            }),
        }
    }

    /// Records `bytes` transferred since the previous sample.
    pub fn add_sample(&self, bytes: u64) {
        let Ok(mut s) = self.inner.lock() else {
            return;
        };
        let now = Instant::now();
        s.samples.push_back(SpeedSample {
            bytes,
            timestamp: now,
        });

        let window = s.window_size;
        while s
            .samples
            .front()
            .is_some_and(|first| now.duration_since(first.timestamp) > window)
        {
            s.samples.pop_front();
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average speed in bytes/second over the retained samples.
    ///
    /// The window is measured from the calculator's start when only one
    /// sample is held, since chunk-sized samples arrive far apart.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(s) = self.inner.lock() else {
            return 0.0;
        };
        let (Some(first), Some(last)) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let since = if s.samples.len() == 1 {
            s.started
        } else {
            first.timestamp
        };
        let elapsed = last.timestamp.duration_since(since);
        if elapsed.is_zero() {
            return 0.0;
        }

        let counted: u64 = if s.samples.len() == 1 {
            first.bytes
        } else {
            // The first sample's bytes were moved before its timestamp.
            s.samples.iter().skip(1).map(|sample| sample.bytes).sum()
        };
        counted as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }
}
