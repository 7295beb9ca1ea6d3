//! Chunk transfer: skip what the node already has, send the rest.

use std::collections::BTreeSet;
use std::future::Future;

use futures_util::StreamExt;
use panbridge_protocol::UploadTarget;
use panbridge_transfer::{
    ChunkPlan, ChunkProgress, ChunkReader, ChunkSpec, Fingerprint, ProgressSink, SpeedCalculator,
    SpooledSource,
};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::UploadError;
use crate::provider::{ChunkUpload, UploadProvider};

/// What to transfer: the plan, its resume key and the chunks to skip.
#[derive(Debug, Clone, Copy)]
pub struct ChunkJob<'a> {
    pub plan: ChunkPlan,
    pub fingerprint: &'a Fingerprint,
    pub file_name: &'a str,
    pub uploaded: &'a BTreeSet<u32>,
}

/// Counters of a finished chunk transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub sent: u32,
    pub skipped: u32,
    pub bytes_sent: u64,
}

/// Sends the chunks of one upload attempt to one target.
pub struct ChunkEngine<'a> {
    provider: &'a dyn UploadProvider,
    target: &'a UploadTarget,
    retry: &'a RetryConfig,
    cancel: CancellationToken,
}

impl<'a> ChunkEngine<'a> {
    pub fn new(
        provider: &'a dyn UploadProvider,
        target: &'a UploadTarget,
        retry: &'a RetryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            target,
            retry,
            cancel,
        }
    }

    /// Transfers a sequential stream positioned at byte 0.
    ///
    /// Chunks are processed in ascending order. Skipped chunks are drained
    /// from the stream so that every chunk starts at its planned offset.
    pub async fn run_sequential<R: AsyncRead + Unpin>(
        &self,
        job: ChunkJob<'_>,
        reader: R,
        progress: &dyn ProgressSink,
    ) -> Result<TransferSummary, UploadError> {
        let mut reader = ChunkReader::new(reader);
        let mut counter = ChunkProgress::new(job.plan.total_chunks());
        let mut summary = TransferSummary::default();
        let speed = SpeedCalculator::new(None, None);

        for spec in job.plan.chunks() {
            if job.uploaded.contains(&spec.index) {
                self.cancellable(reader.skip_chunk(&spec)).await??;
                debug!(index = spec.index, bytes = spec.len, "chunk already uploaded, skipped");
                summary.skipped += 1;
            } else {
                let data = self.cancellable(reader.read_chunk(&spec)).await??;
                self.send(job, &spec, data).await?;
                summary.sent += 1;
                summary.bytes_sent += spec.len;
                speed.add_sample(spec.len);
                log_sent(&spec, &job.plan, &speed, reader.consumed());
            }
            progress.report(counter.advance());
        }

        debug_assert_eq!(reader.consumed(), job.plan.total_size());
        Ok(summary)
    }

    /// Transfers a spooled source with up to `parallelism` chunks in
    /// flight.
    ///
    /// Skipped chunks are reported first; sent chunks are reported in
    /// completion order. Progress stays monotonic because it counts
    /// completed chunks, not positions.
    pub async fn run_ranged(
        &self,
        job: ChunkJob<'_>,
        source: &SpooledSource,
        parallelism: usize,
        progress: &dyn ProgressSink,
    ) -> Result<TransferSummary, UploadError> {
        let mut counter = ChunkProgress::new(job.plan.total_chunks());
        let mut summary = TransferSummary::default();
        let speed = SpeedCalculator::new(None, None);

        let (skipped, pending): (Vec<ChunkSpec>, Vec<ChunkSpec>) = job
            .plan
            .chunks()
            .partition(|spec| job.uploaded.contains(&spec.index));

        for spec in &skipped {
            debug!(index = spec.index, bytes = spec.len, "chunk already uploaded, skipped");
            summary.skipped += 1;
            progress.report(counter.advance());
        }

        let mut in_flight = futures_util::stream::iter(pending.into_iter().map(|spec| async move {
            let data = source.read_range(&spec).await?;
            self.send(job, &spec, data).await?;
            Ok::<_, UploadError>(spec)
        }))
        .buffer_unordered(parallelism.max(1));

        let mut done_bytes = 0u64;
        while let Some(result) = self.cancellable(in_flight.next()).await? {
            let spec = result?;
            summary.sent += 1;
            summary.bytes_sent += spec.len;
            done_bytes += spec.len;
            speed.add_sample(spec.len);
            log_sent(&spec, &job.plan, &speed, done_bytes);
            progress.report(counter.advance());
        }

        Ok(summary)
    }

    /// Sends one chunk, retrying transient failures with backoff.
    async fn send(
        &self,
        job: ChunkJob<'_>,
        spec: &ChunkSpec,
        data: bytes::Bytes,
    ) -> Result<(), UploadError> {
        let chunk = ChunkUpload {
            index: spec.index,
            total_chunks: job.plan.total_chunks(),
            fingerprint: job.fingerprint.clone(),
            file_name: job.file_name.to_string(),
            data,
        };
        let max_attempts = self.retry.attempts();
        let mut attempt = 1;

        loop {
            let result = self
                .cancellable(self.provider.upload_chunk(self.target, chunk.clone()))
                .await?;
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        index = spec.index,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "chunk upload failed, retrying"
                    );
                    self.cancellable(tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(UploadError::ChunkUpload {
                        index: spec.index,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    async fn cancellable<F: Future>(&self, fut: F) -> Result<F::Output, UploadError> {
        cancellable(&self.cancel, fut).await
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, UploadError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        out = fut => Ok(out),
    }
}

fn log_sent(spec: &ChunkSpec, plan: &ChunkPlan, speed: &SpeedCalculator, done_bytes: u64) {
    let eta_secs = speed
        .eta(plan.total_size().saturating_sub(done_bytes))
        .map(|d| d.as_secs());
    debug!(
        index = spec.index,
        chunk_count = plan.total_chunks(),
        bytes = spec.len,
        bytes_per_sec = speed.bytes_per_second() as u64,
        eta_secs,
        "chunk sent"
    );
}
