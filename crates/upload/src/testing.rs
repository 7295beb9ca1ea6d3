//! In-memory provider and token backend shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panbridge_auth::{AuthBackend, Credentials, TokenGrant, TokenManager};
use panbridge_protocol::{
    BoxFuture, FirstUploadReply, MergeResult, ObjectId, ProviderError, StagedUpload, UploadTarget,
};
use panbridge_transfer::Fingerprint;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::provider::{ChunkUpload, DirectUpload, HashedUpload, MergeRequest, UploadProvider};

/// Recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin { token: String, folder: String },
    Direct { file_name: String, size: u64 },
    UploadedChunks { fingerprint: String },
    Chunk { index: u32, total: u32, len: usize },
    Merge { file_name: String, fingerprint: String, total: u32 },
    FirstUpload { token: String, hash: String, file_name: String, size: u64, folder: String },
    Staged { url: String, size: u64 },
    Complete { token: String, csrf_token: String, file_key: String },
}

/// How the mock answers the resume query.
pub enum ResumeAnswer {
    List(Vec<i64>),
    Fail(ProviderError),
    Hang,
}

pub struct MockProvider {
    pub target_url: Mutex<String>,
    pub resume: Mutex<ResumeAnswer>,
    pub begin_failures: Mutex<VecDeque<ProviderError>>,
    pub chunk_failures: Mutex<VecDeque<ProviderError>>,
    pub merge_failure: Mutex<Option<ProviderError>>,
    pub merge_id: Mutex<Option<ObjectId>>,
    pub cancel_after_chunks: Mutex<Option<(usize, CancellationToken)>>,
    pub calls: Mutex<Vec<Call>>,
    pub chunk_data: Mutex<Vec<(u32, Vec<u8>)>>,
    pub direct_body: Mutex<Vec<u8>>,
    pub first_reply: Mutex<FirstUploadReply>,
    pub first_failures: Mutex<VecDeque<ProviderError>>,
    pub staged_body: Mutex<Vec<u8>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            target_url: Mutex::new("https://node.test".into()),
            resume: Mutex::new(ResumeAnswer::List(Vec::new())),
            begin_failures: Mutex::new(VecDeque::new()),
            chunk_failures: Mutex::new(VecDeque::new()),
            merge_failure: Mutex::new(None),
            merge_id: Mutex::new(None),
            cancel_after_chunks: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            chunk_data: Mutex::new(Vec::new()),
            direct_body: Mutex::new(Vec::new()),
            first_reply: Mutex::new(FirstUploadReply::default()),
            first_failures: Mutex::new(VecDeque::new()),
            staged_body: Mutex::new(Vec::new()),
        }
    }

    pub fn with_uploaded(self, indices: &[i64]) -> Self {
        *self.resume.lock().unwrap() = ResumeAnswer::List(indices.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Indices of chunk requests, in call order (retries included).
    pub fn chunk_calls(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Chunk { index, .. } => Some(index),
                _ => None,
            })
            .collect()
    }

    /// Chunks accepted by the mock, sorted by index.
    pub fn stored_chunks(&self) -> Vec<(u32, Vec<u8>)> {
        let mut chunks = self.chunk_data.lock().unwrap().clone();
        chunks.sort_by_key(|(i, _)| *i);
        chunks
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

async fn read_body(upload: &mut DirectUpload) -> Result<Vec<u8>, ProviderError> {
    let mut body = Vec::new();
    upload
        .body
        .read_to_end(&mut body)
        .await
        .map_err(|e| ProviderError::Transport {
            message: e.to_string(),
            timeout: false,
        })?;
    Ok(body)
}

impl UploadProvider for MockProvider {
    fn begin_upload<'a>(
        &'a self,
        access_token: &'a str,
        folder_id: &'a str,
    ) -> BoxFuture<'a, Result<UploadTarget, ProviderError>> {
        Box::pin(async move {
            self.record(Call::Begin {
                token: access_token.to_string(),
                folder: folder_id.to_string(),
            });
            if let Some(err) = self.begin_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(UploadTarget {
                url: self.target_url.lock().unwrap().clone(),
                query: "session=abc".into(),
            })
        })
    }

    fn upload_direct<'a>(
        &'a self,
        _target: &'a UploadTarget,
        mut upload: DirectUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(async move {
            self.record(Call::Direct {
                file_name: upload.file_name.clone(),
                size: upload.size,
            });
            *self.direct_body.lock().unwrap() = read_body(&mut upload).await?;
            Ok(MergeResult {
                file_id: Some(ObjectId::from("direct-1")),
            })
        })
    }

    fn uploaded_chunks<'a>(
        &'a self,
        _target: &'a UploadTarget,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Vec<i64>, ProviderError>> {
        Box::pin(async move {
            self.record(Call::UploadedChunks {
                fingerprint: fingerprint.to_string(),
            });
            let answer = match &*self.resume.lock().unwrap() {
                ResumeAnswer::List(list) => Some(Ok(list.clone())),
                ResumeAnswer::Fail(err) => Some(Err(err.clone())),
                ResumeAnswer::Hang => None,
            };
            match answer {
                Some(result) => result,
                None => std::future::pending().await,
            }
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        _target: &'a UploadTarget,
        chunk: ChunkUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.record(Call::Chunk {
                index: chunk.index,
                total: chunk.total_chunks,
                len: chunk.data.len(),
            });
            if let Some(err) = self.chunk_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            let stored = {
                let mut data = self.chunk_data.lock().unwrap();
                data.push((chunk.index, chunk.data.to_vec()));
                data.len()
            };
            if let Some((after, cancel)) = &*self.cancel_after_chunks.lock().unwrap()
                && stored >= *after
            {
                cancel.cancel();
            }
            Ok(())
        })
    }

    fn merge_chunks<'a>(
        &'a self,
        _target: &'a UploadTarget,
        request: &'a MergeRequest,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(async move {
            self.record(Call::Merge {
                file_name: request.file_name.clone(),
                fingerprint: request.fingerprint.to_string(),
                total: request.total_chunks,
            });
            if let Some(err) = self.merge_failure.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(MergeResult {
                file_id: self.merge_id.lock().unwrap().clone(),
            })
        })
    }

    fn first_upload<'a>(
        &'a self,
        access_token: &'a str,
        upload: &'a HashedUpload,
    ) -> BoxFuture<'a, Result<FirstUploadReply, ProviderError>> {
        Box::pin(async move {
            self.record(Call::FirstUpload {
                token: access_token.to_string(),
                hash: upload.content_hash.to_string(),
                file_name: upload.file_name.clone(),
                size: upload.size,
                folder: upload.folder_id.clone(),
            });
            if let Some(err) = self.first_failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            Ok(self.first_reply.lock().unwrap().clone())
        })
    }

    fn upload_staged<'a>(
        &'a self,
        staging: &'a StagedUpload,
        mut upload: DirectUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.record(Call::Staged {
                url: staging.upload_url.clone(),
                size: upload.size,
            });
            *self.staged_body.lock().unwrap() = read_body(&mut upload).await?;
            Ok(())
        })
    }

    fn complete_upload<'a>(
        &'a self,
        access_token: &'a str,
        _upload: &'a HashedUpload,
        staging: &'a StagedUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(async move {
            self.record(Call::Complete {
                token: access_token.to_string(),
                csrf_token: staging.csrf_token.clone(),
                file_key: staging.file_key.clone(),
            });
            Ok(MergeResult {
                file_id: Some(ObjectId::from("staged-1")),
            })
        })
    }
}

/// Token backend that always grants; tokens are numbered by call.
pub struct StaticAuth {
    pub auth_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl AuthBackend for StaticAuth {
    fn authenticate<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
        Box::pin(async move {
            let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenGrant {
                access_token: format!("token-{n}"),
                refresh_token: Some("refresh".into()),
                expires_in: Duration::from_secs(3600),
            })
        })
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> BoxFuture<'a, Result<TokenGrant, ProviderError>> {
        Box::pin(async move {
            let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(TokenGrant {
                access_token: format!("refreshed-{n}"),
                refresh_token: None,
                expires_in: Duration::from_secs(3600),
            })
        })
    }
}

pub fn token_manager() -> (Arc<StaticAuth>, Arc<TokenManager>) {
    let backend = Arc::new(StaticAuth {
        auth_calls: AtomicUsize::new(0),
        refresh_calls: AtomicUsize::new(0),
    });
    let tokens = TokenManager::new(
        Arc::clone(&backend) as Arc<dyn AuthBackend>,
        Some(Credentials::new("key", "secret")),
    );
    (backend, Arc::new(tokens))
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 241) as u8).collect()
}

pub fn target() -> UploadTarget {
    UploadTarget {
        url: "https://node.test".into(),
        query: "session=abc".into(),
    }
}

pub fn transport_error() -> ProviderError {
    ProviderError::Transport {
        message: "connection reset by peer".into(),
        timeout: false,
    }
}
