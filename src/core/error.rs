//! Error types for batch protocol operations.
//!
//! This module defines all error types that can occur when encoding, decoding,
//! or streaming batched records. The [`Result`] type alias provides a convenient
//! shorthand for operations that may fail.
//!
//! # Error Categories
//!
//! | Category | Variants | Fatal to the response |
//! |----------|----------|-----------------------|
//! | Wire format | `WireFormat` | Yes |
//! | Resolution | `Resolution` | Raised before any I/O |
//! | Transport | `Http`, `Server` | Yes, ends a query cursor |
//! | Usage | `BodyConsumed`, `Config` | No |
//!
//! Failures of single records inside an otherwise successful batch are not
//! errors: the server reports them in `x-reduct-error-*` headers and they are
//! returned as [`RecordErrors`] next to the successful write.
//!
//! # Examples
//!
//! ```
//! use reduct_batch::ReductError;
//!
//! let err = ReductError::Server { status: 503, message: "busy".into() };
//! assert!(err.is_retryable());
//! assert_eq!(err.status(), Some(503));
//!
//! let err = ReductError::WireFormat("x-reduct-start-ts header is required".into());
//! assert!(!err.is_retryable());
//! ```

use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for batch protocol operations.
pub type Result<T> = std::result::Result<T, ReductError>;

/// Errors that can occur during batch protocol operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ReductError {
    /// Malformed batch headers or body.
    ///
    /// Covers bad header names and values, missing required headers,
    /// entry or label indices out of range, bad percent escapes, invalid
    /// UTF-8 and bodies shorter than advertised. Never retried.
    #[error("Wire format error: {0}")]
    WireFormat(String),

    /// A batch item could not be assigned to an entry.
    ///
    /// Raised at encode time, before any request is sent.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The server answered with an error status.
    ///
    /// The message comes from the `x-reduct-error` response header.
    #[error("Status {status}: {message}")]
    Server { status: u16, message: String },

    /// HTTP transport failed (connection refused, broken body stream, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The record body was already read.
    #[error("Record body already consumed")]
    BodyConsumed,

    /// Invalid client or query configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ReductError {
    /// HTTP status of a server error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            ReductError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is transient.
    ///
    /// Returns `true` for transport failures and the HTTP statuses
    /// 408, 425, 429, 502, 503 and 504. This layer never retries by itself;
    /// the flag is for callers that wrap it.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ReductError::Http(_) => true,
            ReductError::Server { status, .. } => {
                matches!(status, 408 | 425 | 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// A failure of a single record reported by the server inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordError {
    pub status: u16,
    pub message: String,
}

impl RecordError {
    /// Parse the `statusCode,message` value of an error header.
    pub fn from_header(value: &str) -> Result<Self> {
        let (status, message) = value.split_once(',').ok_or_else(|| {
            ReductError::WireFormat(format!("Invalid error header value '{}'", value))
        })?;
        let status = status.trim().parse::<u16>().map_err(|_| {
            ReductError::WireFormat(format!(
                "Invalid status code in error header value '{}'",
                value
            ))
        })?;
        Ok(Self {
            status,
            message: message.trim().to_string(),
        })
    }
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Status {}: {}", self.status, self.message)
    }
}

/// Identifies a record inside a batch: `(entry, timestamp)`.
///
/// For v1 batches the entry is the single entry the batch was written to.
pub type RecordKey = (String, u64);

/// Per-record failures of a batch, keyed by record.
pub type RecordErrors = BTreeMap<RecordKey, RecordError>;
