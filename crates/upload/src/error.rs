//! Upload error types.

use panbridge_auth::{AuthError, AuthFailure};
use panbridge_protocol::ProviderError;
use panbridge_transfer::TransferError;

/// Errors produced by an upload. All are fatal for the current attempt;
/// a failed upload can be retried as a whole and will resume from the
/// chunks the upload node already holds.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("begin upload failed: {0}")]
    Begin(ProviderError),

    #[error("upload node appears to be offline, try again later")]
    Unavailable,

    #[error("direct upload failed: {0}")]
    Direct(ProviderError),

    #[error("chunk {index} failed after {attempts} attempt(s): {source}")]
    ChunkUpload {
        index: u32,
        attempts: u32,
        source: ProviderError,
    },

    #[error("stream truncated: expected {expected} bytes, got {actual}")]
    TruncatedStream { expected: u64, actual: u64 },

    #[error("merge failed: {0}")]
    Merge(ProviderError),

    #[error("instant upload handshake failed: {0}")]
    Handshake(ProviderError),

    #[error("upload confirmation failed: {0}")]
    Confirm(ProviderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(e) => Self::Io(e),
            TransferError::InvalidInput(msg) => Self::InvalidInput(msg),
            TransferError::Truncated { expected, actual } => {
                Self::TruncatedStream { expected, actual }
            }
        }
    }
}

impl AuthFailure for UploadError {
    fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Begin(e) | Self::Handshake(e) | Self::Confirm(e) if e.is_unauthorized()
        )
    }
}
