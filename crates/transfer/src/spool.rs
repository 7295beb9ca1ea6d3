//! Local spool for sources that must be read out of order.
//!
//! Parallel chunk transfer needs random access to the source. A plain
//! stream is copied once into a temporary file, hashing the fingerprint
//! prefix and the whole content on the way, and chunks are then read back
//! by offset.

use std::io::SeekFrom;

use bytes::Bytes;
use md5::{Digest, Md5};
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::TransferError;
use crate::chunked::read_full;
use crate::fingerprint::{Fingerprint, fingerprinted_len};
use crate::plan::ChunkSpec;
use crate::source::BoxReader;

const COPY_BUF: usize = 256 * 1024;

/// A source spooled to a temporary file. The file is removed on drop.
#[derive(Debug)]
pub struct SpooledSource {
    name: String,
    size: u64,
    content_hash: Fingerprint,
    file: NamedTempFile,
}

impl SpooledSource {
    /// Copies exactly `size` bytes of `reader` into a temporary file and
    /// fingerprints the first `prefix` of them.
    pub async fn spool<R: AsyncRead + Unpin>(
        name: impl Into<String>,
        size: u64,
        reader: R,
        prefix: u64,
    ) -> Result<(Self, Fingerprint), TransferError> {
        let name = name.into();
        let file = NamedTempFile::new()?;
        let mut out = tokio::fs::File::create(file.path()).await?;

        let mut limited = reader.take(size);
        let mut hasher = Md5::new();
        let mut whole = Md5::new();
        let mut to_hash = fingerprinted_len(size, prefix);
        let mut written = 0u64;
        let mut buf = vec![0u8; COPY_BUF];

        loop {
            let n = limited.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let hashed = (n as u64).min(to_hash) as usize;
            if hashed > 0 {
                hasher.update(&buf[..hashed]);
                to_hash -= hashed as u64;
            }
            whole.update(&buf[..n]);
            out.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        out.flush().await?;

        if written < size {
            return Err(TransferError::Truncated {
                expected: size,
                actual: written,
            });
        }

        tracing::debug!(name = %name, size, path = %file.path().display(), "source spooled");
        let spooled = Self {
            name,
            size,
            content_hash: Fingerprint::from_hasher(whole),
            file,
        };
        Ok((spooled, Fingerprint::from_hasher(hasher)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// MD5 of the complete content, used as the deduplication key.
    pub fn content_hash(&self) -> &Fingerprint {
        &self.content_hash
    }

    /// Opens the spooled content as a stream positioned at byte 0.
    pub async fn reader(&self) -> Result<BoxReader, TransferError> {
        let file = tokio::fs::File::open(self.file.path()).await?;
        Ok(Box::pin(file.take(self.size)))
    }

    /// Reads the byte range of one chunk. Safe to call concurrently.
    pub async fn read_range(&self, spec: &ChunkSpec) -> Result<Bytes, TransferError> {
        let len = usize::try_from(spec.len).map_err(|_| {
            TransferError::InvalidInput(format!("chunk of {} bytes does not fit in memory", spec.len))
        })?;
        let mut file = tokio::fs::File::open(self.file.path()).await?;
        file.seek(SeekFrom::Start(spec.offset)).await?;

        let mut buf = vec![0u8; len];
        let n = read_full(&mut file, &mut buf).await?;
        if n < len {
            return Err(TransferError::Truncated {
                expected: spec.offset + spec.len,
                actual: spec.offset + n as u64,
            });
        }
        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint_stream;
    use crate::plan::ChunkPlan;
    use std::io::Cursor;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    #[tokio::test]
    async fn spool_fingerprint_matches_stream_fingerprint() {
        let data = pattern(600_000);
        let (spooled, fp) = SpooledSource::spool("x", 600_000, Cursor::new(data.clone()), 300_000)
            .await
            .unwrap();
        let (expected, _) = fingerprint_stream(Cursor::new(data), 600_000, 300_000)
            .await
            .unwrap();
        assert_eq!(fp, expected);
        assert_eq!(spooled.size(), 600_000);
        assert_eq!(spooled.name(), "x");
    }

    #[tokio::test]
    async fn ranges_read_back_in_any_order() {
        let data = pattern(1000);
        let (spooled, _) = SpooledSource::spool("x", 1000, Cursor::new(data.clone()), 100)
            .await
            .unwrap();
        let plan = ChunkPlan::new(1000, 300).unwrap();

        for index in [3u32, 0, 2, 1] {
            let spec = plan.chunk(index).unwrap();
            let chunk = spooled.read_range(&spec).await.unwrap();
            let start = spec.offset as usize;
            assert_eq!(&chunk[..], &data[start..start + spec.len as usize]);
        }
    }

    #[tokio::test]
    async fn extra_bytes_past_size_are_ignored() {
        let data = pattern(50);
        let (spooled, _) = SpooledSource::spool("x", 40, Cursor::new(data), 10)
            .await
            .unwrap();
        let plan = ChunkPlan::new(40, 40).unwrap();
        let chunk = spooled.read_range(&plan.chunk(0).unwrap()).await.unwrap();
        assert_eq!(chunk.len(), 40);
    }

    #[tokio::test]
    async fn content_hash_covers_whole_file() {
        let data = pattern(5000);
        let (spooled, prefix) = SpooledSource::spool("x", 5000, Cursor::new(data.clone()), 100)
            .await
            .unwrap();
        assert_eq!(spooled.content_hash(), &Fingerprint::of_bytes(&data));
        assert_ne!(spooled.content_hash(), &prefix);

        let mut replay = Vec::new();
        spooled
            .reader()
            .await
            .unwrap()
            .read_to_end(&mut replay)
            .await
            .unwrap();
        assert_eq!(replay, data);
    }

    #[tokio::test]
    async fn short_stream_is_truncation() {
        let err = SpooledSource::spool("x", 100, Cursor::new(pattern(60)), 10)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Truncated {
                expected: 100,
                actual: 60
            }
        ));
    }
}
