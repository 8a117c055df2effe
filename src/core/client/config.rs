//! Configuration for the batch client.
//!
//! # Configuration Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `url` | `http://127.0.0.1:8383` | Server URL |
//! | `api_token` | none | Sent as `Authorization: Bearer <token>` |
//! | `batch_protocol` | `V2` | Wire format of batches |
//! | `request_timeout_ms` | 30000 | Whole-request timeout |
//! | `connection_timeout_secs` | 30 | Connect timeout |
//! | `max_idle_connections` | 32 | Idle connections kept per host |
//! | `verify_ssl` | true | Verify TLS certificates |
//! | `enable_logging` | false | Log requests and record errors |
//! | `extra_headers` | empty | Added to every request |
//!
//! # Examples
//!
//! ```
//! use reduct_batch::{ClientConfig, ProtocolVersion};
//!
//! let config = ClientConfig {
//!     url: "https://play.reduct.store".to_string(),
//!     batch_protocol: ProtocolVersion::V1,
//!     ..Default::default()
//! };
//! assert_eq!(config.request_timeout_ms, 30000);
//! ```

use crate::core::protocol::ProtocolVersion;
use std::collections::BTreeMap;

/// Configuration for [`ReductClient`](super::ReductClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server URL. A path prefix is kept when building request URLs.
    pub url: String,

    /// API token. No refresh is attempted.
    pub api_token: Option<String>,

    /// Batch protocol version, resolved once when the client is built.
    pub batch_protocol: ProtocolVersion,

    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,

    /// Maximum idle connections kept in the pool per host.
    pub max_idle_connections: usize,

    /// Verify the server's TLS certificate.
    pub verify_ssl: bool,

    /// Enable request logging.
    ///
    /// When enabled, logs queries, pages and per-record write errors using
    /// the `tracing` crate.
    pub enable_logging: bool,

    /// Headers added to every request.
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "http://127.0.0.1:8383".to_string(),
            api_token: None,
            batch_protocol: ProtocolVersion::V2,
            request_timeout_ms: 30000,
            connection_timeout_secs: 30,
            max_idle_connections: 32,
            verify_ssl: true,
            enable_logging: false,
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_batch_protocol(mut self, version: ProtocolVersion) -> Self {
        self.batch_protocol = version;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }
}
