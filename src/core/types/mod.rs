//! Core data types for batched records.
//!
//! # Type Overview
//!
//! ```text
//!   Batch ──(BatchCodec::encode)──► EncodedBatch ──► ReductRequest
//!                                                        │
//!                                                        ▼
//!   Record ◄──(RecordDemuxer)── DecodedBatch ◄── ReductResponse
//! ```
//!
//! | Type | Description |
//! |------|-------------|
//! | [`BatchItem`] | A record waiting to be written |
//! | [`Batch`] | Records written in one request |
//! | [`Record`] | A record read back, with a single-pass payload |
//! | [`QueryOptions`] | Parameters of a one-shot or continuous query |
//! | [`ReductRequest`] | Transport-neutral HTTP request |
//! | [`ReductResponse`] | HTTP response with a streamed body |

use std::collections::BTreeMap;

mod batch;
mod body;
mod query;
mod record;
mod request;
mod response;

/// Record labels. Ordered so header output is deterministic.
pub type Labels = BTreeMap<String, String>;

pub use batch::{Batch, BatchItem, ResolvedItem};
pub use body::{BodyReader, BufferCursor, ByteStream};
pub use bytes::Bytes;
pub use query::{EntrySelector, QueryMode, QueryOptions, QueryState};
pub(crate) use body::record_len;
pub(crate) use record::RecordBody;
pub use record::{Record, RecordChunks};
pub use request::{Method, ReductRequest};
pub use response::ReductResponse;
