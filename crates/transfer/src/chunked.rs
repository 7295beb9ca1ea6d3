use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransferError;
use crate::plan::ChunkSpec;

/// Reads until `buf` is full or the stream ends. Returns the bytes read.
pub async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Cuts a sequential, non-seekable stream into planned chunks.
///
/// Chunk boundaries are defined by read position, so chunks must be
/// consumed in plan order. A chunk is either read into memory for sending
/// or skipped by draining its bytes.
pub struct ChunkReader<R> {
    reader: R,
    consumed: u64,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            consumed: 0,
        }
    }

    /// Bytes consumed from the stream so far (sent or skipped).
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Reads exactly `spec.len` bytes for sending.
    pub async fn read_chunk(&mut self, spec: &ChunkSpec) -> Result<Bytes, TransferError> {
        self.check_position(spec)?;
        let len = usize::try_from(spec.len).map_err(|_| {
            TransferError::InvalidInput(format!("chunk of {} bytes does not fit in memory", spec.len))
        })?;
        let mut buf = vec![0u8; len];
        let n = read_full(&mut self.reader, &mut buf).await?;
        self.consumed += n as u64;
        if n < len {
            return Err(TransferError::Truncated {
                expected: spec.offset + spec.len,
                actual: self.consumed,
            });
        }
        Ok(Bytes::from(buf))
    }

    /// Advances past `spec.len` bytes without keeping them.
    pub async fn skip_chunk(&mut self, spec: &ChunkSpec) -> Result<(), TransferError> {
        self.check_position(spec)?;
        let mut limited = (&mut self.reader).take(spec.len);
        let skipped = tokio::io::copy(&mut limited, &mut tokio::io::sink()).await?;
        self.consumed += skipped;
        if skipped < spec.len {
            return Err(TransferError::Truncated {
                expected: spec.offset + spec.len,
                actual: self.consumed,
            });
        }
        Ok(())
    }

    fn check_position(&self, spec: &ChunkSpec) -> Result<(), TransferError> {
        if spec.offset != self.consumed {
            return Err(TransferError::InvalidInput(format!(
                "chunk {} starts at byte {} but the stream is at byte {}",
                spec.index, spec.offset, self.consumed
            )));
        }
        Ok(())
    }
}
