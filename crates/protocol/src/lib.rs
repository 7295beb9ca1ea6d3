//! Wire types for the remote storage provider.
//!
//! Every provider response is a JSON [`Envelope`] carrying a status code,
//! an optional message and a typed `data` payload. Payloads are decoded
//! once at the HTTP boundary into the per-kind structs in [`messages`].

pub mod envelope;
pub mod error;
pub mod messages;

use std::future::Future;
use std::pin::Pin;

pub use envelope::{Envelope, SUCCESS_CODES, UNAUTHORIZED_CODES};
pub use error::ProviderError;
pub use messages::{
    AuthGrant, DownloadLink, FileItem, FileList, FirstUploadReply, FolderCreated, MergeResult,
    ObjectId, RefreshGrant, StagedUpload, UploadTarget,
};

/// Boxed future returned by the object-safe provider seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
