//! Remote side of an upload, per attempt.

use std::fmt;

use bytes::Bytes;
use panbridge_protocol::{
    BoxFuture, FirstUploadReply, MergeResult, ProviderError, StagedUpload, UploadTarget,
};
use panbridge_transfer::{BoxReader, Fingerprint};

/// Body of a single-shot upload, streamed from the source.
pub struct DirectUpload {
    pub file_name: String,
    pub size: u64,
    pub body: BoxReader,
}

impl fmt::Debug for DirectUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectUpload")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// One chunk and the metadata sent alongside it.
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub index: u32,
    pub total_chunks: u32,
    pub fingerprint: Fingerprint,
    pub file_name: String,
    pub data: Bytes,
}

/// Request to assemble the uploaded chunks of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub fingerprint: Fingerprint,
    pub file_name: String,
    pub total_chunks: u32,
}

/// Identity of a whole file for the instant-upload handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedUpload {
    /// MD5 of the complete content.
    pub content_hash: Fingerprint,
    pub file_name: String,
    pub size: u64,
    pub folder_id: String,
}

/// Upload endpoints of the remote provider.
///
/// Only [`begin_upload`](Self::begin_upload) takes the access token; the
/// other calls are authorised by the opaque query of the returned target.
pub trait UploadProvider: Send + Sync {
    /// Asks for an upload node for a new file in `folder_id`.
    fn begin_upload<'a>(
        &'a self,
        access_token: &'a str,
        folder_id: &'a str,
    ) -> BoxFuture<'a, Result<UploadTarget, ProviderError>>;

    /// Sends a whole file in one request.
    fn upload_direct<'a>(
        &'a self,
        target: &'a UploadTarget,
        upload: DirectUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>>;

    /// Lists the chunk indices already stored for `fingerprint`.
    fn uploaded_chunks<'a>(
        &'a self,
        target: &'a UploadTarget,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Vec<i64>, ProviderError>>;

    /// Sends one chunk.
    fn upload_chunk<'a>(
        &'a self,
        target: &'a UploadTarget,
        chunk: ChunkUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Assembles the uploaded chunks into the final object.
    fn merge_chunks<'a>(
        &'a self,
        target: &'a UploadTarget,
        request: &'a MergeRequest,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>>;

    /// Offers a content hash to the provider, which either links existing
    /// content or hands out a staging location.
    fn first_upload<'a>(
        &'a self,
        access_token: &'a str,
        upload: &'a HashedUpload,
    ) -> BoxFuture<'a, Result<FirstUploadReply, ProviderError>>;

    /// Sends the body to a staging location handed out by
    /// [`first_upload`](Self::first_upload).
    fn upload_staged<'a>(
        &'a self,
        staging: &'a StagedUpload,
        upload: DirectUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    /// Confirms a staged body, creating the object.
    fn complete_upload<'a>(
        &'a self,
        access_token: &'a str,
        upload: &'a HashedUpload,
        staging: &'a StagedUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>>;
}
