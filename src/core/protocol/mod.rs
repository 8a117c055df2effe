//! Batch protocol wire format.
//!
//! A batch packs the metadata of many records into HTTP headers and their
//! payloads, back to back, into one body. Two header layouts exist:
//!
//! | Version | Entries per batch | Record header | Value |
//! |---------|-------------------|---------------|-------|
//! | v1 | 1 | `x-reduct-time-<ts>` | `size,contentType[,label=value]*` |
//! | v2 | many | `x-reduct-<entryIndex>-<delta>` | `size[,contentType][,labelDelta]` |
//!
//! The version is picked once per client and dispatched through
//! [`BatchCodec`].
//!
//! # Examples
//!
//! ```
//! use reduct_batch::{Batch, ProtocolVersion};
//!
//! let mut batch = Batch::new();
//! batch.add("entry-0", 1000, "a");
//! batch.add("entry-1", 2000, "bb");
//!
//! let codec = ProtocolVersion::V2.codec();
//! let encoded = codec.encode(&batch, None).unwrap();
//! assert_eq!(encoded.headers["x-reduct-entries"], "entry-0,entry-1");
//! assert_eq!(encoded.headers["x-reduct-start-ts"], "1000");
//! assert_eq!(encoded.content_length, 3);
//! ```

pub mod constants;
pub mod entry_name;
pub mod labels;
mod v1;
mod v2;

pub use v1::BatchCodecV1;
pub use v2::BatchCodecV2;

use crate::core::error::{RecordErrors, ReductError, Result};
use crate::core::types::{Batch, Labels, ResolvedItem};
use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Batch protocol version, selected by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

impl ProtocolVersion {
    pub fn codec(self) -> Arc<dyn BatchCodec> {
        match self {
            ProtocolVersion::V1 => Arc::new(BatchCodecV1),
            ProtocolVersion::V2 => Arc::new(BatchCodecV2),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolVersion::V1 => f.write_str("v1"),
            ProtocolVersion::V2 => f.write_str("v2"),
        }
    }
}

/// Fully resolved metadata of one record in a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedBatchHeader {
    pub entry_index: usize,
    pub timestamp: u64,
    pub content_length: u64,
    pub content_type: String,
    pub labels: Labels,
}

/// Record headers of a response in body order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedBatch {
    pub entries: Vec<String>,
    pub headers: Vec<ParsedBatchHeader>,
}

impl DecodedBatch {
    pub fn entry(&self, header: &ParsedBatchHeader) -> Result<&str> {
        self.entries
            .get(header.entry_index)
            .map(String::as_str)
            .ok_or_else(|| {
                ReductError::WireFormat(format!(
                    "Entry index {} is out of range",
                    header.entry_index
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A batch ready to send.
#[derive(Clone, Debug, Default)]
pub struct EncodedBatch {
    /// Request headers, names lower-cased.
    pub headers: BTreeMap<String, String>,
    pub content_length: u64,
    /// Payloads concatenated in wire order.
    pub body: Bytes,
    /// Entry table the record headers refer to.
    pub entries: Vec<String>,
    /// Time base of v2 deltas. Zero for v1.
    pub start_ts: u64,
}

/// Encoder and decoder for one protocol version.
pub trait BatchCodec: Send + Sync + std::fmt::Debug {
    fn version(&self) -> ProtocolVersion;

    /// Build request headers and body. Items without an entry use
    /// `default_entry`.
    fn encode(&self, batch: &Batch, default_entry: Option<&str>) -> Result<EncodedBatch>;

    /// Parse the record headers of a response, sorted in body order.
    ///
    /// v1 responses carry no entry table, so they need `default_entry`.
    fn decode(&self, headers: &BTreeMap<String, String>, default_entry: Option<&str>) -> Result<DecodedBatch>;

    /// Parse per-record errors from the response to a write of `sent`.
    fn decode_errors(&self, headers: &BTreeMap<String, String>, sent: &EncodedBatch) -> Result<RecordErrors>;
}

pub(crate) fn concat_payloads(records: &[ResolvedItem<'_>]) -> Bytes {
    let total = records.iter().map(|r| r.item.payload.len()).sum();
    let mut body = BytesMut::with_capacity(total);
    for record in records {
        body.extend_from_slice(&record.item.payload);
    }
    body.freeze()
}

pub(crate) fn parse_content_length(raw: &str, value: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        ReductError::WireFormat(format!(
            "Invalid content length in batched header value '{}'",
            value
        ))
    })
}
