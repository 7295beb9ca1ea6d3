use std::path::PathBuf;

use panbridge_auth::{AuthError, AuthFailure};
use panbridge_protocol::ProviderError;
use panbridge_transfer::TransferError;
use panbridge_upload::UploadError;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to access {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl From<TransferError> for DriverError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Upload(other.into()),
        }
    }
}

impl AuthFailure for DriverError {
    fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Provider(e) if e.is_unauthorized())
    }
}
