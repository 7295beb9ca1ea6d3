//! Resumable upload pipeline.
//!
//! [`UploadPipeline::put`] classifies a transfer, then either sends it in
//! one request or fingerprints it, asks the upload node which chunks it
//! already holds, sends the rest and requests a server-side merge. With
//! instant upload enabled it offers the whole-file hash first instead.
//!
//! The remote side is reached through the [`UploadProvider`] trait so the
//! pipeline can be driven by the HTTP client or by an in-memory mock.

pub mod config;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod pipeline;
pub mod provider;
pub mod resume;

#[cfg(test)]
mod testing;

pub use config::{RetryConfig, UploadConfig};
pub use engine::{ChunkEngine, ChunkJob, TransferSummary};
pub use error::UploadError;
pub use finalize::finalize;
pub use pipeline::{UploadMode, UploadOutcome, UploadPipeline};
pub use provider::{ChunkUpload, DirectUpload, HashedUpload, MergeRequest, UploadProvider};
pub use resume::negotiate_resume;
