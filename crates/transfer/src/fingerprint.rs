//! Content fingerprint used as the resume/dedup key.
//!
//! The fingerprint is the MD5 of the first `min(size, prefix)` bytes. For
//! files larger than the prefix this is an approximation: two files that
//! share the same leading bytes are treated as the same upload.

use std::fmt;
use std::io::Cursor;

use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt, Chain};

use crate::TransferError;
use crate::chunked::read_full;

/// Hex-encoded MD5 digest (32 lowercase characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprints an in-memory buffer in full.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(data)))
    }

    pub(crate) fn from_hasher(hasher: Md5) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Number of bytes covered by the fingerprint of a `size`-byte file.
pub fn fingerprinted_len(size: u64, prefix: u64) -> u64 {
    size.min(prefix)
}

/// Fingerprints the head of `reader` without losing it.
///
/// The fingerprinted bytes are buffered and replayed in front of the rest
/// of the stream, so the returned reader starts again at byte 0.
pub async fn fingerprint_stream<R: AsyncRead + Unpin>(
    mut reader: R,
    size: u64,
    prefix: u64,
) -> Result<(Fingerprint, Chain<Cursor<Vec<u8>>, R>), TransferError> {
    let want = fingerprinted_len(size, prefix);
    let want = usize::try_from(want).map_err(|_| {
        TransferError::InvalidInput(format!("fingerprint prefix of {want} bytes is too large"))
    })?;

    let mut head = vec![0u8; want];
    let n = read_full(&mut reader, &mut head).await?;
    if n < want {
        return Err(TransferError::Truncated {
            expected: size,
            actual: n as u64,
        });
    }

    let fingerprint = Fingerprint::of_bytes(&head);
    Ok((fingerprint, Cursor::new(head).chain(reader)))
}
