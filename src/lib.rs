//! reduct_batch: batch protocol codec and streaming query client.
//!
//! This crate speaks the batched HTTP wire format of ReductStore-compatible
//! time-series blob stores:
//!
//! - **protocol**: v1 (single-entry) and v2 (multi-entry) batch header codecs,
//!   entry-name percent encoding, and label delta encoding.
//! - **stream**: demultiplexing one HTTP response body into many records.
//! - **client**: batch writes and the query/subscribe cursor.

pub mod core;

// Top-level re-exports for common usage
pub use crate::core::error::{RecordError, ReductError, Result};
pub use crate::core::protocol::{BatchCodec, ProtocolVersion};
pub use crate::core::types;
pub use crate::core::types::{
    Batch, BatchItem, EntrySelector, Labels, QueryOptions, Record, RecordChunks,
};

#[cfg(feature = "client")]
pub use crate::core::client::NativeNetwork;
pub use crate::core::client::{Bucket, ClientConfig, CursorState, QueryCursor, ReductClient};
