//! Batch protocol HTTP client.
//!
//! This module drives the batch codecs over HTTP, enabling clients to:
//!
//! - **Write many records** to one or more entries in a single request
//! - **Collect per-record failures** without failing the whole write
//! - **Query** records page by page as one stream
//! - **Subscribe** to new records with a continuous, polling query
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── fetch          - ReductClient and Bucket operations
//! ├── cursor         - Query cursor state machine
//! ├── endpoints      - Per-version paths and request bodies
//! ├── native_network - reqwest transport
//! ├── config         - Client configuration
//! └── utils          - Utility functions
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ReductClient`] | Client bound to one server and protocol version |
//! | [`Bucket`] | Batch writes and queries on one bucket |
//! | [`QueryCursor`] | Record iterator spanning all pages of a query |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ```no_run
//! use reduct_batch::{Batch, ClientConfig, QueryOptions, ReductClient};
//!
//! # async fn example() -> reduct_batch::Result<()> {
//! let client = ReductClient::new(ClientConfig::new("http://127.0.0.1:8383"))?;
//! let bucket = client.bucket("sensors");
//!
//! let mut batch = Batch::new();
//! batch.add("temperature", 1_000, "21.5");
//! batch.add("humidity", 1_000, "40");
//! let errors = bucket.write_batch(&batch, None).await?;
//! assert!(errors.is_empty());
//!
//! let mut cursor = bucket.query(&["temperature", "humidity"][..], QueryOptions::new().with_start(0))?;
//! while let Some(record) = cursor.next().await {
//!     let mut record = record?;
//!     let body = record.read_all().await?;
//!     println!("{} {} {:?}", record.entry, record.timestamp, body);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod cursor;
mod endpoints;
mod fetch;
#[cfg(feature = "client")]
mod native_network;
mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ClientConfig;
pub use cursor::{CursorState, QueryCursor};
pub use endpoints::{endpoints_for, Endpoints, EndpointsV1, EndpointsV2};
pub use fetch::{Bucket, ReductClient};
#[cfg(feature = "client")]
pub use native_network::NativeNetwork;
pub use utils::{encode_path_segment, sleep};
