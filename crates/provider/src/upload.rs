use panbridge_protocol::{
    BoxFuture, FirstUploadReply, MergeResult, ProviderError, StagedUpload, UploadTarget,
};
use panbridge_transfer::Fingerprint;
use panbridge_upload::{ChunkUpload, DirectUpload, HashedUpload, MergeRequest, UploadProvider};
use reqwest::Body;
use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::client::{ProviderClient, is_root, node_url, send, transport_error};

impl ProviderClient {
    async fn request_target(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<UploadTarget, ProviderError> {
        let mut request = self
            .http
            .get(self.endpoint("Getuploads"))
            .bearer_auth(access_token);
        if !is_root(folder_id) {
            request = request.query(&[("fid", folder_id)]);
        }

        let target: UploadTarget = send(request).await?.into_data()?;
        debug!(node = %target.url, "upload node assigned");
        Ok(target)
    }

    async fn post_file(
        &self,
        target: &UploadTarget,
        upload: DirectUpload,
    ) -> Result<MergeResult, ProviderError> {
        let DirectUpload {
            file_name,
            size,
            body,
        } = upload;
        let stream = ReaderStream::new(body.take(size));
        let part = Part::stream_with_length(Body::wrap_stream(stream), size).file_name(file_name);
        let request = self
            .http
            .post(node_url(target, "upload", &[], &[]))
            .timeout(self.chunk_timeout)
            .multipart(Form::new().part("file", part));

        Ok(send::<MergeResult>(request).await?.check()?.unwrap_or_default())
    }

    async fn list_chunks(
        &self,
        target: &UploadTarget,
        fingerprint: &Fingerprint,
    ) -> Result<Vec<i64>, ProviderError> {
        let url = node_url(target, "uploadedChunks", &[("hash", fingerprint.as_str())], &[]);
        Ok(send::<Vec<i64>>(self.http.get(url))
            .await?
            .check()?
            .unwrap_or_default())
    }

    async fn post_chunk(
        &self,
        target: &UploadTarget,
        chunk: ChunkUpload,
    ) -> Result<(), ProviderError> {
        let index = chunk.index.to_string();
        let total = chunk.total_chunks.to_string();
        let url = node_url(
            target,
            "uploadChunk",
            &[("hash", chunk.fingerprint.as_str())],
            &[
                ("index", &index),
                ("totalChunks", &total),
                ("filename", &chunk.file_name),
            ],
        );

        let len = chunk.data.len() as u64;
        let part = Part::stream_with_length(chunk.data, len).file_name(chunk.file_name);
        let request = self
            .http
            .post(url)
            .timeout(self.chunk_timeout)
            .multipart(Form::new().part("file", part));

        send::<serde_json::Value>(request).await?.check()?;
        Ok(())
    }

    async fn post_merge(
        &self,
        target: &UploadTarget,
        merge: &MergeRequest,
    ) -> Result<MergeResult, ProviderError> {
        let total = merge.total_chunks.to_string();
        let request = self
            .http
            .post(node_url(target, "mergeChunks", &[], &[]))
            .timeout(self.chunk_timeout)
            .form(&[
                ("filename", merge.file_name.as_str()),
                ("hash", merge.fingerprint.as_str()),
                ("totalChunks", total.as_str()),
            ]);

        Ok(send::<MergeResult>(request).await?.check()?.unwrap_or_default())
    }

    async fn offer_hash(
        &self,
        access_token: &str,
        upload: &HashedUpload,
    ) -> Result<FirstUploadReply, ProviderError> {
        let request = self
            .http
            .post(self.endpoint("first_upload"))
            .bearer_auth(access_token)
            .multipart(hashed_form(upload));

        let reply: FirstUploadReply = send(request).await?.into_data()?;
        debug!(
            content_hash = %upload.content_hash,
            instant = reply.is_instant(),
            "instant upload handshake answered"
        );
        Ok(reply)
    }

    /// The staging URL is pre-signed; it takes a bare body and answers
    /// with a status only.
    async fn put_staged(
        &self,
        staging: &StagedUpload,
        upload: DirectUpload,
    ) -> Result<(), ProviderError> {
        let DirectUpload { size, body, .. } = upload;
        let stream = ReaderStream::new(body.take(size));
        let resp = self
            .http
            .put(&staging.upload_url)
            .timeout(self.chunk_timeout)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn confirm_staged(
        &self,
        access_token: &str,
        upload: &HashedUpload,
        staging: &StagedUpload,
    ) -> Result<MergeResult, ProviderError> {
        let form = hashed_form(upload)
            .text("csrf_token", staging.csrf_token.clone())
            .text("file_key", staging.file_key.clone());
        let request = self
            .http
            .post(self.endpoint("ok_upload"))
            .bearer_auth(access_token)
            .multipart(form);

        Ok(send::<MergeResult>(request).await?.check()?.unwrap_or_default())
    }
}

fn hashed_form(upload: &HashedUpload) -> Form {
    Form::new()
        .text("hash", upload.content_hash.to_string())
        .text("filename", upload.file_name.clone())
        .text("filesize", upload.size.to_string())
        .text("folder", upload.folder_id.clone())
}

impl UploadProvider for ProviderClient {
    fn begin_upload<'a>(
        &'a self,
        access_token: &'a str,
        folder_id: &'a str,
    ) -> BoxFuture<'a, Result<UploadTarget, ProviderError>> {
        Box::pin(self.request_target(access_token, folder_id))
    }

    fn upload_direct<'a>(
        &'a self,
        target: &'a UploadTarget,
        upload: DirectUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(self.post_file(target, upload))
    }

    fn uploaded_chunks<'a>(
        &'a self,
        target: &'a UploadTarget,
        fingerprint: &'a Fingerprint,
    ) -> BoxFuture<'a, Result<Vec<i64>, ProviderError>> {
        Box::pin(self.list_chunks(target, fingerprint))
    }

    fn upload_chunk<'a>(
        &'a self,
        target: &'a UploadTarget,
        chunk: ChunkUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(self.post_chunk(target, chunk))
    }

    fn merge_chunks<'a>(
        &'a self,
        target: &'a UploadTarget,
        request: &'a MergeRequest,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(self.post_merge(target, request))
    }

    fn first_upload<'a>(
        &'a self,
        access_token: &'a str,
        upload: &'a HashedUpload,
    ) -> BoxFuture<'a, Result<FirstUploadReply, ProviderError>> {
        Box::pin(self.offer_hash(access_token, upload))
    }

    fn upload_staged<'a>(
        &'a self,
        staging: &'a StagedUpload,
        upload: DirectUpload,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(self.put_staged(staging, upload))
    }

    fn complete_upload<'a>(
        &'a self,
        access_token: &'a str,
        upload: &'a HashedUpload,
        staging: &'a StagedUpload,
    ) -> BoxFuture<'a, Result<MergeResult, ProviderError>> {
        Box::pin(self.confirm_staged(access_token, upload, staging))
    }
}
