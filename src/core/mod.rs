//! ReductStore batch protocol implementation for Rust

pub mod client;
pub mod error;
pub mod protocol;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::{RecordError, RecordErrors, RecordKey, ReductError, Result};
pub use protocol::{BatchCodec, DecodedBatch, EncodedBatch, ParsedBatchHeader, ProtocolVersion};
pub use stream::RecordDemuxer;
pub use types::{Batch, BatchItem, Record, ReductRequest, ReductResponse};

pub use client::{Bucket, ClientConfig, CursorState, QueryCursor, ReductClient};
