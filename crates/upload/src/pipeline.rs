//! `Put` orchestration.

use std::sync::Arc;

use panbridge_auth::TokenManager;
use panbridge_protocol::{ObjectId, ProviderError, UploadTarget};
use panbridge_transfer::{
    ChunkPlan, CountingReader, Fingerprint, ProgressSink, SpooledSource, StreamSource, UploadPlan,
    fingerprint_stream, plan_upload, validate_file_name,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::UploadConfig;
use crate::engine::{ChunkEngine, ChunkJob, TransferSummary, cancellable};
use crate::error::UploadError;
use crate::finalize::finalize;
use crate::provider::{DirectUpload, HashedUpload, MergeRequest, UploadProvider};
use crate::resume::negotiate_resume;

/// How a finished upload was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Direct,
    /// The provider already held the content and linked it without a
    /// transfer.
    Instant,
    /// Sent to a staging location from the instant-upload handshake and
    /// confirmed afterwards.
    Staged,
    Chunked {
        total_chunks: u32,
        sent: u32,
        skipped: u32,
    },
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub file_name: String,
    pub size: u64,
    /// Provider-assigned id of the new object, when the provider reports
    /// one.
    pub object_id: Option<ObjectId>,
    pub mode: UploadMode,
    /// Resume key of a chunked upload, or the full content hash of an
    /// instant or staged one.
    pub fingerprint: Option<Fingerprint>,
}

/// Uploads files to one provider on behalf of one session.
pub struct UploadPipeline {
    provider: Arc<dyn UploadProvider>,
    tokens: Arc<TokenManager>,
    config: UploadConfig,
    cancel: CancellationToken,
}

impl UploadPipeline {
    pub fn new(
        provider: Arc<dyn UploadProvider>,
        tokens: Arc<TokenManager>,
        config: UploadConfig,
    ) -> Self {
        Self {
            provider,
            tokens,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abort uploads. Cancelling leaves chunks already on
    /// the node in place for a later resume.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Uploads `source` into `folder_id`.
    ///
    /// Progress is reported in `[0, 100]`; the merge step is not part of
    /// that range.
    pub async fn put(
        &self,
        folder_id: &str,
        source: StreamSource,
        progress: &dyn ProgressSink,
    ) -> Result<UploadOutcome, UploadError> {
        validate_file_name(source.name())?;
        let plan = plan_upload(source.size(), &self.config.plan_config())?;

        if self.config.instant_upload {
            info!(file_name = %source.name(), size = source.size(), "hashing for instant upload");
            return self.put_hashed(folder_id, source, progress).await;
        }

        match &plan {
            UploadPlan::Direct { size } => {
                info!(file_name = %source.name(), size, "uploading in a single request");
            }
            UploadPlan::Chunked(chunks) => info!(
                file_name = %source.name(),
                size = chunks.total_size(),
                chunk_size = chunks.chunk_size(),
                chunk_count = chunks.total_chunks(),
                "uploading in chunks"
            ),
        }

        let target = self.begin(folder_id).await?;

        match plan {
            UploadPlan::Direct { .. } => self.put_direct(&target, source, progress).await,
            UploadPlan::Chunked(chunks) => {
                self.put_chunked(&target, chunks, source, progress).await
            }
        }
    }

    async fn begin(&self, folder_id: &str) -> Result<UploadTarget, UploadError> {
        let provider = &self.provider;
        let target = self
            .tokens
            .authorized(|token| async move {
                cancellable(&self.cancel, provider.begin_upload(&token, folder_id))
                    .await?
                    .map_err(UploadError::Begin)
            })
            .await?;

        if target.url.trim().is_empty() {
            return Err(UploadError::Unavailable);
        }
        Ok(target)
    }

    async fn put_direct(
        &self,
        target: &UploadTarget,
        source: StreamSource,
        progress: &dyn ProgressSink,
    ) -> Result<UploadOutcome, UploadError> {
        let (file_name, size, body) = source.into_parts();
        let (body, counter) = CountingReader::new(body);
        let upload = DirectUpload {
            file_name: file_name.clone(),
            size,
            body: Box::pin(body),
        };

        let result = cancellable(&self.cancel, self.provider.upload_direct(target, upload)).await?;
        // A short source surfaces as a transport failure from the request.
        if let Some(actual) = counter.short_of(size) {
            return Err(UploadError::TruncatedStream {
                expected: size,
                actual,
            });
        }
        let result = result.map_err(UploadError::Direct)?;
        progress.report(100.0);
        info!(file_name = %file_name, size, "direct upload completed");

        Ok(UploadOutcome {
            file_name,
            size,
            object_id: result.file_id,
            mode: UploadMode::Direct,
            fingerprint: None,
        })
    }

    async fn put_chunked(
        &self,
        target: &UploadTarget,
        plan: ChunkPlan,
        source: StreamSource,
        progress: &dyn ProgressSink,
    ) -> Result<UploadOutcome, UploadError> {
        let (file_name, size, reader) = source.into_parts();
        let engine = ChunkEngine::new(
            self.provider.as_ref(),
            target,
            &self.config.retry,
            self.cancel.clone(),
        );

        let (fingerprint, summary) = if self.config.parallelism > 1 {
            let spool =
                SpooledSource::spool(file_name.as_str(), size, reader, self.config.fingerprint_prefix);
            let (spooled, fingerprint) = cancellable(&self.cancel, spool).await??;
            info!(fingerprint = %fingerprint, "fingerprint computed");
            let uploaded = self.negotiate(target, &fingerprint, plan).await?;
            let job = ChunkJob {
                plan,
                fingerprint: &fingerprint,
                file_name: &file_name,
                uploaded: &uploaded,
            };
            let summary = engine
                .run_ranged(job, &spooled, self.config.parallelism, progress)
                .await?;
            (fingerprint, summary)
        } else {
            let head = fingerprint_stream(reader, size, self.config.fingerprint_prefix);
            let (fingerprint, replay) = cancellable(&self.cancel, head).await??;
            info!(fingerprint = %fingerprint, "fingerprint computed");
            let uploaded = self.negotiate(target, &fingerprint, plan).await?;
            let job = ChunkJob {
                plan,
                fingerprint: &fingerprint,
                file_name: &file_name,
                uploaded: &uploaded,
            };
            let summary = engine.run_sequential(job, replay, progress).await?;
            (fingerprint, summary)
        };

        let request = MergeRequest {
            fingerprint,
            file_name,
            total_chunks: plan.total_chunks(),
        };
        let merged = finalize(self.provider.as_ref(), target, &request, &self.cancel).await?;

        let TransferSummary { sent, skipped, .. } = summary;
        Ok(UploadOutcome {
            file_name: request.file_name,
            size,
            object_id: merged.file_id,
            mode: UploadMode::Chunked {
                total_chunks: plan.total_chunks(),
                sent,
                skipped,
            },
            fingerprint: Some(request.fingerprint),
        })
    }

    async fn negotiate(
        &self,
        target: &UploadTarget,
        fingerprint: &Fingerprint,
        plan: ChunkPlan,
    ) -> Result<std::collections::BTreeSet<u32>, UploadError> {
        let query = negotiate_resume(
            self.provider.as_ref(),
            target,
            fingerprint,
            plan.total_chunks(),
            self.config.resume_timeout(),
        );
        cancellable(&self.cancel, query).await
    }

    /// Offers the full content hash first; transfers the body only when the
    /// provider does not hold it yet.
    async fn put_hashed(
        &self,
        folder_id: &str,
        source: StreamSource,
        progress: &dyn ProgressSink,
    ) -> Result<UploadOutcome, UploadError> {
        let (file_name, size, reader) = source.into_parts();
        let spool =
            SpooledSource::spool(file_name.as_str(), size, reader, self.config.fingerprint_prefix);
        let (spooled, _) = cancellable(&self.cancel, spool).await??;
        let upload = HashedUpload {
            content_hash: spooled.content_hash().clone(),
            file_name,
            size,
            folder_id: folder_id.to_string(),
        };

        let provider = &self.provider;
        let upload_ref = &upload;
        let reply = self
            .tokens
            .authorized(|token| async move {
                cancellable(&self.cancel, provider.first_upload(&token, upload_ref))
                    .await?
                    .map_err(UploadError::Handshake)
            })
            .await?;

        if reply.is_instant() {
            progress.report(100.0);
            info!(
                file_name = %upload.file_name,
                content_hash = %upload.content_hash,
                "content already stored, linked without transfer"
            );
            return Ok(UploadOutcome {
                file_name: upload.file_name,
                size,
                object_id: reply.file_id,
                mode: UploadMode::Instant,
                fingerprint: Some(upload.content_hash),
            });
        }

        let staging = reply.staging().ok_or_else(|| {
            UploadError::Handshake(ProviderError::Decode(
                "reply carries neither an instant match nor a staging location".into(),
            ))
        })?;
        let body = DirectUpload {
            file_name: upload.file_name.clone(),
            size,
            body: spooled.reader().await?,
        };
        cancellable(&self.cancel, provider.upload_staged(&staging, body))
            .await?
            .map_err(UploadError::Direct)?;
        progress.report(100.0);

        let staging_ref = &staging;
        let result = self
            .tokens
            .authorized(|token| async move {
                cancellable(&self.cancel, provider.complete_upload(&token, upload_ref, staging_ref))
                    .await?
                    .map_err(UploadError::Confirm)
            })
            .await?;
        info!(file_name = %upload.file_name, size, "staged upload confirmed");

        Ok(UploadOutcome {
            file_name: upload.file_name,
            size,
            object_id: result.file_id,
            mode: UploadMode::Staged,
            fingerprint: Some(upload.content_hash),
        })
    }
}
