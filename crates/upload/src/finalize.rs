use panbridge_protocol::{MergeResult, UploadTarget};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::cancellable;
use crate::error::UploadError;
use crate::provider::{MergeRequest, UploadProvider};

/// Requests the server-side merge of all uploaded chunks.
///
/// Sent exactly once: a failed merge is not retried, since the node may
/// already have assembled part of the object. Chunks stay on the node
/// after a failure and are reused by the next attempt.
pub async fn finalize(
    provider: &dyn UploadProvider,
    target: &UploadTarget,
    request: &MergeRequest,
    cancel: &CancellationToken,
) -> Result<MergeResult, UploadError> {
    info!(
        file_name = %request.file_name,
        fingerprint = %request.fingerprint,
        chunk_count = request.total_chunks,
        "requesting merge"
    );

    let result = cancellable(cancel, provider.merge_chunks(target, request))
        .await?
        .map_err(UploadError::Merge)?;

    info!(
        file_name = %request.file_name,
        file_id = result.file_id.as_ref().map(|id| id.as_str()).unwrap_or("<unknown>"),
        "merge completed"
    );
    Ok(result)
}
