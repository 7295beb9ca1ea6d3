//! Byte counting for streams handed to a transport.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Reader that counts the bytes passing through it and notes end of
/// stream.
pub struct CountingReader<R> {
    inner: R,
    tally: Arc<Tally>,
}

#[derive(Debug, Default)]
struct Tally {
    bytes: AtomicU64,
    eof: AtomicBool,
}

/// Shared view of a [`CountingReader`]'s progress, readable after the
/// reader has been moved away.
#[derive(Debug, Clone)]
pub struct ReadCounter {
    tally: Arc<Tally>,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> (Self, ReadCounter) {
        let tally = Arc::new(Tally::default());
        let counter = ReadCounter {
            tally: Arc::clone(&tally),
        };
        (Self { inner, tally }, counter)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = buf.filled().len() - before;
            if read == 0 && buf.remaining() > 0 {
                self.tally.eof.store(true, Ordering::Release);
            }
            self.tally.bytes.fetch_add(read as u64, Ordering::AcqRel);
        }
        poll
    }
}

impl ReadCounter {
    pub fn bytes(&self) -> u64 {
        self.tally.bytes.load(Ordering::Acquire)
    }

    /// Number of bytes actually available, if the stream ended before
    /// `expected` bytes were read.
    pub fn short_of(&self, expected: u64) -> Option<u64> {
        let bytes = self.bytes();
        (self.tally.eof.load(Ordering::Acquire) && bytes < expected).then_some(bytes)
    }
}
