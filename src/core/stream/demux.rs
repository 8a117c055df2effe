//! Record demultiplexer.
//!
//! Records of a batch share one response body and appear in header order.
//! All records but the last are read into memory as soon as they are
//! reached; the last record is handed out with the body itself so the
//! caller controls how the (usually largest) payload is pulled.
//!
//! ```text
//!   body: | rec 0 | rec 1 | ... | rec N-1 | rec N ...........|
//!           buffer  buffer        buffer    streamed on demand
//! ```

use crate::core::error::{ReductError, Result};
use crate::core::protocol::{BatchCodec, DecodedBatch, ParsedBatchHeader};
use crate::core::types::{record_len, BodyReader, BufferCursor, Record, RecordBody, ReductResponse};
use bytes::BytesMut;
use futures::Stream;
use std::collections::VecDeque;

/// Turns a decoded batch and its body into a sequence of [`Record`]s.
///
/// Not meant for concurrent use; records are produced strictly in order.
/// Once produced, a record's payload is independent of the others.
#[derive(Debug)]
pub struct RecordDemuxer {
    entries: Vec<String>,
    headers: VecDeque<ParsedBatchHeader>,
    /// Record being buffered. Kept across cancelled reads.
    in_flight: Option<(ParsedBatchHeader, BytesMut)>,
    body: Option<BodyReader>,
    head_only: bool,
    end_of_query: bool,
}

impl RecordDemuxer {
    /// Create a demuxer.
    ///
    /// `head_only` makes every payload empty whatever its advertised size.
    /// `end_of_query` flags the final record as `last`; callers pass `false`
    /// for continuous queries.
    pub fn new(decoded: DecodedBatch, body: BodyReader, head_only: bool, end_of_query: bool) -> Self {
        Self {
            entries: decoded.entries,
            headers: decoded.headers.into(),
            in_flight: None,
            body: Some(body),
            head_only,
            end_of_query,
        }
    }

    /// Decode a response with `codec` and wrap its body.
    ///
    /// `one_shot` must be `false` for continuous queries so that no record is
    /// ever flagged `last`.
    pub fn from_response(
        codec: &dyn BatchCodec,
        response: ReductResponse,
        default_entry: Option<&str>,
        head_only: bool,
        one_shot: bool,
    ) -> Result<Self> {
        let end_of_query = one_shot && response.is_end_of_query();
        let (_, headers, body) = response.into_parts();
        let decoded = codec.decode(&headers, default_entry)?;
        tracing::trace!(
            records = decoded.len(),
            entries = decoded.entries.len(),
            end_of_query,
            "Decoded batch"
        );
        Ok(Self::new(decoded, body, head_only, end_of_query))
    }

    /// Number of records not produced yet.
    pub fn remaining(&self) -> usize {
        self.headers.len() + usize::from(self.in_flight.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Produce the next record, or `None` when the batch is exhausted.
    ///
    /// Cancel safe: if the future is dropped while a record is being
    /// buffered, the next call resumes that record. After an error the
    /// demuxer yields nothing more.
    pub async fn next_record(&mut self) -> Option<Result<Record>> {
        if self.in_flight.is_none() {
            let header = self.headers.pop_front()?;
            self.in_flight = Some((header, BytesMut::new()));
        }
        let result = self.build_record().await;
        if result.is_err() {
            self.headers.clear();
            self.in_flight = None;
            self.body = None;
        }
        Some(result)
    }

    async fn build_record(&mut self) -> Result<Record> {
        let (entry, content_length) = match &self.in_flight {
            Some((header, _)) => {
                let entry = self.entries.get(header.entry_index).cloned().ok_or_else(|| {
                    ReductError::WireFormat(format!(
                        "Entry index {} is out of range",
                        header.entry_index
                    ))
                })?;
                (entry, header.content_length)
            }
            None => return Err(ReductError::WireFormat("No record to read".to_string())),
        };
        let is_final = self.headers.is_empty();
        let streamed = is_final && !self.head_only;

        if !self.head_only && !is_final {
            let len = record_len(content_length)?;
            let reader = self.body.as_mut().ok_or_else(|| {
                ReductError::WireFormat("Response body is no longer available".to_string())
            })?;
            if let Some((_, buffer)) = self.in_flight.as_mut() {
                reader.fill_to(buffer, len).await?;
            }
        }

        let Some((header, buffer)) = self.in_flight.take() else {
            return Err(ReductError::WireFormat("No record to read".to_string()));
        };
        let body = if self.head_only {
            RecordBody::Buffered(BufferCursor::default())
        } else if is_final {
            let reader = self.body.take().unwrap_or_else(BodyReader::empty);
            RecordBody::Streamed {
                reader,
                remaining: header.content_length,
            }
        } else {
            RecordBody::Buffered(BufferCursor::new(buffer.freeze()))
        };

        tracing::trace!(
            entry = %entry,
            timestamp = header.timestamp,
            size = header.content_length,
            streamed,
            "Demuxed record"
        );

        Ok(Record::new(
            entry,
            header.timestamp,
            header.content_length,
            header.content_type,
            header.labels,
            is_final && self.end_of_query,
            body,
        ))
    }

    /// Consume the demuxer as a stream of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send {
        futures::stream::unfold(self, |mut demux| async move {
            demux.next_record().await.map(|record| (record, demux))
        })
    }
}
