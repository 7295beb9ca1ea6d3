use std::collections::BTreeSet;
use std::time::Duration;

use panbridge_protocol::UploadTarget;
use panbridge_transfer::Fingerprint;
use tracing::{debug, info, warn};

use crate::provider::UploadProvider;

/// Asks the upload node which chunks of `fingerprint` it already holds.
///
/// Never fails: a transport error, a rejected query or a timeout all
/// degrade to an empty set, which means a full re-upload. Indices outside
/// `0..total_chunks` are dropped.
pub async fn negotiate_resume(
    provider: &dyn UploadProvider,
    target: &UploadTarget,
    fingerprint: &Fingerprint,
    total_chunks: u32,
    timeout: Duration,
) -> BTreeSet<u32> {
    let reported = match tokio::time::timeout(timeout, provider.uploaded_chunks(target, fingerprint))
        .await
    {
        Ok(Ok(indices)) => indices,
        Ok(Err(e)) => {
            warn!(fingerprint = %fingerprint, error = %e, "resume query failed, uploading all chunks");
            return BTreeSet::new();
        }
        Err(_) => {
            warn!(
                fingerprint = %fingerprint,
                timeout_secs = timeout.as_secs_f64(),
                "resume query timed out, uploading all chunks"
            );
            return BTreeSet::new();
        }
    };

    let reported_count = reported.len();
    let uploaded: BTreeSet<u32> = reported
        .into_iter()
        .filter_map(|i| u32::try_from(i).ok())
        .filter(|&i| i < total_chunks)
        .collect();

    if uploaded.len() < reported_count {
        debug!(
            reported = reported_count,
            kept = uploaded.len(),
            "ignored out-of-range or duplicate chunk indices"
        );
    }
    info!(
        fingerprint = %fingerprint,
        uploaded = uploaded.len(),
        chunk_count = total_chunks,
        "resume state negotiated"
    );
    uploaded
}
