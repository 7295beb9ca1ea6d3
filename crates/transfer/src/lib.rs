//! Upload planning, content fingerprinting and chunked stream reading.
//!
//! Nothing in this crate talks to the network: it classifies a transfer,
//! derives the resume key for it and cuts the source stream into the
//! planned chunks.

mod chunked;
mod counted;
mod fingerprint;
mod plan;
mod progress;
mod source;
mod spool;
mod validation;

pub use chunked::{ChunkReader, read_full};
pub use counted::{CountingReader, ReadCounter};
pub use fingerprint::{Fingerprint, fingerprint_stream, fingerprinted_len};
pub use plan::{ChunkPlan, ChunkSpec, PlanConfig, UploadPlan, plan_upload};
pub use progress::{ChunkProgress, NoProgress, ProgressSink, SpeedCalculator};
pub use source::{BoxReader, StreamSource};
pub use spool::SpooledSource;
pub use validation::validate_file_name;

/// Default chunk size: 100 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Files at or below this size (1 GiB) are sent in a single request.
pub const DEFAULT_DIRECT_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Number of leading bytes (10 MiB) covered by the content fingerprint.
pub const DEFAULT_FINGERPRINT_PREFIX: u64 = 10 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("stream truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: u64, actual: u64 },
}
