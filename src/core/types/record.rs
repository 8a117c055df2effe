//! Records yielded by batched reads and queries.

use crate::core::error::{ReductError, Result};
use crate::core::types::body::{BodyReader, BufferCursor};
use crate::core::types::Labels;
use bytes::Bytes;
use futures::Stream;
use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Where a record's payload lives.
#[derive(Debug)]
pub(crate) enum RecordBody {
    /// Payload already pulled off the wire.
    Buffered(BufferCursor),
    /// Final record of a response: read straight from the response body.
    Streamed { reader: BodyReader, remaining: u64 },
    Consumed,
}

/// One timestamped record of an entry.
///
/// The payload can be read once, either whole with [`Record::read_all`] or
/// incrementally with [`Record::read_chunks`]. Metadata stays available
/// after the payload is consumed.
#[derive(Debug)]
pub struct Record {
    pub entry: String,
    /// UNIX timestamp in microseconds.
    pub timestamp: u64,
    pub size: u64,
    pub content_type: String,
    pub labels: Labels,
    /// Set on the final record of a one-shot query.
    pub last: bool,
    body: RecordBody,
}

impl Record {
    pub(crate) fn new(
        entry: String,
        timestamp: u64,
        size: u64,
        content_type: String,
        labels: Labels,
        last: bool,
        body: RecordBody,
    ) -> Self {
        Self {
            entry,
            timestamp,
            size,
            content_type,
            labels,
            last,
            body,
        }
    }

    /// Timestamp as a `SystemTime`.
    pub fn time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.timestamp)
    }

    /// `true` until the payload has been handed out.
    pub fn is_readable(&self) -> bool {
        !matches!(self.body, RecordBody::Consumed)
    }

    /// Read the whole payload.
    pub async fn read_all(&mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.body, RecordBody::Consumed) {
            RecordBody::Buffered(mut cursor) => Ok(cursor.remaining()),
            RecordBody::Streamed {
                mut reader,
                remaining,
            } => reader.read_exact(remaining).await,
            RecordBody::Consumed => Err(ReductError::BodyConsumed),
        }
    }

    /// Read the payload in chunks of at most `max_chunk_size` bytes.
    ///
    /// The returned stream is single-pass and owns the payload.
    pub fn read_chunks(&mut self, max_chunk_size: usize) -> Result<RecordChunks> {
        if max_chunk_size == 0 {
            return Err(ReductError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        match std::mem::replace(&mut self.body, RecordBody::Consumed) {
            RecordBody::Consumed => Err(ReductError::BodyConsumed),
            body => Ok(RecordChunks {
                body,
                max_chunk_size,
            }),
        }
    }
}

/// Chunked, single-pass reader over a record payload.
#[derive(Debug)]
pub struct RecordChunks {
    body: RecordBody,
    max_chunk_size: usize,
}

impl RecordChunks {
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
        poll_fn(|cx| self.poll_chunk(cx)).await
    }

    fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes>>> {
        let max = self.max_chunk_size;
        match &mut self.body {
            RecordBody::Buffered(cursor) => Poll::Ready(cursor.next_chunk(max).map(Ok)),
            RecordBody::Streamed { reader, remaining } => {
                if *remaining == 0 {
                    return Poll::Ready(None);
                }
                let want = usize::try_from(*remaining).map_or(max, |r| r.min(max));
                match reader.poll_chunk(cx, want) {
                    Poll::Ready(Some(Ok(chunk))) => {
                        *remaining -= chunk.len() as u64;
                        Poll::Ready(Some(Ok(chunk)))
                    }
                    Poll::Ready(Some(Err(e))) => {
                        self.body = RecordBody::Consumed;
                        Poll::Ready(Some(Err(e)))
                    }
                    Poll::Ready(None) => {
                        let missing = *remaining;
                        self.body = RecordBody::Consumed;
                        Poll::Ready(Some(Err(ReductError::WireFormat(format!(
                            "Body ended {} bytes before the end of the record",
                            missing
                        )))))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
            RecordBody::Consumed => Poll::Ready(None),
        }
    }
}

impl Stream for RecordChunks {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_chunk(cx)
    }
}
