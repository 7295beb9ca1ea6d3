use std::time::Duration;

use panbridge_transfer::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DIRECT_THRESHOLD, DEFAULT_FINGERPRINT_PREFIX, PlanConfig,
};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Upload tuning. Every field has a default, so a partial JSON object is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Fixed chunk size in bytes.
    pub chunk_size: u64,
    /// Files at or below this size are sent in a single request.
    pub direct_threshold: u64,
    /// Number of leading bytes covered by the fingerprint.
    pub fingerprint_prefix: u64,
    /// Concurrent chunk uploads. `1` streams the source sequentially;
    /// larger values spool it to a temporary file first.
    pub parallelism: usize,
    /// Deadline for the resume query, after which the upload starts over.
    pub resume_timeout_secs: u64,
    /// Hash the whole file and offer it to the provider first, skipping
    /// the transfer when the provider already holds the content.
    pub instant_upload: bool,
    pub retry: RetryConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            direct_threshold: DEFAULT_DIRECT_THRESHOLD,
            fingerprint_prefix: DEFAULT_FINGERPRINT_PREFIX,
            parallelism: 1,
            resume_timeout_secs: 15,
            instant_upload: false,
            retry: RetryConfig::default(),
        }
    }
}

impl UploadConfig {
    pub fn plan_config(&self) -> PlanConfig {
        PlanConfig {
            direct_threshold: self.direct_threshold,
            chunk_size: self.chunk_size,
        }
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_secs(self.resume_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        if self.chunk_size == 0 {
            return Err(UploadError::InvalidInput("chunk_size must be positive".into()));
        }
        if self.fingerprint_prefix == 0 {
            return Err(UploadError::InvalidInput(
                "fingerprint_prefix must be positive".into(),
            ));
        }
        if self.parallelism == 0 {
            return Err(UploadError::InvalidInput("parallelism must be at least 1".into()));
        }
        Ok(())
    }
}

/// Backoff policy for re-sending a chunk after a transient failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per chunk, including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    /// Backoff cap.
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculates the delay after failed attempt `attempt` (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let ms = self.initial_delay_ms as f64 * self.backoff_factor.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let with_jitter = (capped + capped * 0.25 * jitter_offset(nanos)).max(0.0);
        Duration::from_secs_f64(with_jitter / 1000.0)
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Maps the sub-second clock reading onto `[-1.0, 1.0)`.
fn jitter_offset(subsec_nanos: u32) -> f64 {
    subsec_nanos as f64 / 1_000_000_000.0 * 2.0 - 1.0
}
