//! Byte sources behind batched records.
//!
//! [`BodyReader`] wraps the chunked HTTP response body. [`BufferCursor`] is an
//! in-memory body with an explicit read offset, used for the records of a
//! batch that are buffered before the final one.

use crate::core::error::{ReductError, Result};
use crate::core::protocol::constants::CHUNK_SIZE;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Boxed stream of body chunks as produced by the transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Sequential reader over a chunked response body.
///
/// Chunks larger than the requested size are split and the remainder is
/// kept for the next read, so callers control how much is pulled at once.
pub struct BodyReader {
    stream: Option<ByteStream>,
    pending: Bytes,
}

impl BodyReader {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: Some(Box::pin(stream)),
            pending: Bytes::new(),
        }
    }

    /// A body with no bytes, e.g. for HEAD responses.
    pub fn empty() -> Self {
        Self {
            stream: None,
            pending: Bytes::new(),
        }
    }

    pub fn from_bytes(body: impl Into<Bytes>) -> Self {
        Self {
            stream: None,
            pending: body.into(),
        }
    }

    /// Poll for at most `max` bytes. Returns `None` once the body is exhausted.
    pub fn poll_chunk(&mut self, cx: &mut Context<'_>, max: usize) -> Poll<Option<Result<Bytes>>> {
        loop {
            if !self.pending.is_empty() {
                let n = max.min(self.pending.len());
                return Poll::Ready(Some(Ok(self.pending.split_to(n))));
            }

            let Some(stream) = self.stream.as_mut() else {
                return Poll::Ready(None);
            };

            match stream.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(chunk))) => self.pending = chunk,
                Poll::Ready(Some(Err(e))) => {
                    self.stream = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    self.stream = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// Read the next chunk of at most `max` bytes.
    pub async fn next_chunk(&mut self, max: usize) -> Option<Result<Bytes>> {
        poll_fn(|cx| self.poll_chunk(cx, max)).await
    }

    /// Read exactly `len` bytes, pulling at most [`CHUNK_SIZE`] bytes per read.
    ///
    /// The buffer grows as bytes arrive, so an advertised size is never
    /// allocated up front. Fails with a wire format error if the body ends
    /// early.
    pub async fn read_exact(&mut self, len: u64) -> Result<Bytes> {
        let len = record_len(len)?;
        let mut buffer = BytesMut::with_capacity(len.min(CHUNK_SIZE));
        self.fill_to(&mut buffer, len).await?;
        Ok(buffer.freeze())
    }

    /// Append to `buffer` until it holds `len` bytes.
    ///
    /// Cancel safe: bytes read before the future is dropped stay in `buffer`
    /// and a later call picks up where it stopped.
    pub async fn fill_to(&mut self, buffer: &mut BytesMut, len: usize) -> Result<()> {
        while buffer.len() < len {
            let want = CHUNK_SIZE.min(len - buffer.len());
            match self.next_chunk(want).await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ReductError::WireFormat(format!(
                        "Body ended after {} of {} bytes",
                        buffer.len(),
                        len
                    )))
                }
            }
        }
        Ok(())
    }

    /// Read the rest of the body.
    pub async fn read_to_end(&mut self) -> Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next_chunk(CHUNK_SIZE).await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

/// Advertised record size as a buffer length.
pub(crate) fn record_len(len: u64) -> Result<usize> {
    usize::try_from(len)
        .map_err(|_| ReductError::WireFormat(format!("Record of {} bytes is too large", len)))
}

impl std::fmt::Debug for BodyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyReader")
            .field("has_stream", &self.stream.is_some())
            .field("pending_len", &self.pending.len())
            .finish()
    }
}

/// In-memory body with an explicit read offset.
#[derive(Clone, Debug, Default)]
pub struct BufferCursor {
    buffer: Bytes,
    offset: usize,
}

impl BufferCursor {
    pub fn new(buffer: Bytes) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Next slice of at most `max` bytes, or `None` at end of buffer.
    pub fn next_chunk(&mut self, max: usize) -> Option<Bytes> {
        if self.offset >= self.buffer.len() {
            return None;
        }
        let end = self.buffer.len().min(self.offset + max);
        let chunk = self.buffer.slice(self.offset..end);
        self.offset = end;
        Some(chunk)
    }

    /// Everything not read yet.
    pub fn remaining(&mut self) -> Bytes {
        let rest = self.buffer.slice(self.offset..);
        self.offset = self.buffer.len();
        rest
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
