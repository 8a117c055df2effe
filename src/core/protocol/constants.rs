//! Header names and protocol constants.

/// Prefix shared by all batch protocol headers.
pub const HEADER_PREFIX: &str = "x-reduct-";

/// v1 per-record metadata: `x-reduct-time-<timestamp>`.
pub const TIME_PREFIX: &str = "x-reduct-time-";

/// Per-record error: `x-reduct-error-<timestamp>` (v1) or
/// `x-reduct-error-<entryIndex>-<delta>` (v2).
pub const ERROR_PREFIX: &str = "x-reduct-error-";

/// v2 entry table.
pub const ENTRIES_HEADER: &str = "x-reduct-entries";

/// v2 time base in microseconds.
pub const START_TS_HEADER: &str = "x-reduct-start-ts";

/// v2 label name table.
pub const LABELS_HEADER: &str = "x-reduct-labels";

/// End-of-query marker.
pub const LAST_HEADER: &str = "x-reduct-last";

/// Query id for v2 fetch requests.
pub const QUERY_ID_HEADER: &str = "x-reduct-query-id";

/// Message of a failed request.
pub const SERVER_ERROR_HEADER: &str = "x-reduct-error";

pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// Content type of batch bodies and the default for records.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Largest single read when pulling a record off the response body.
pub const CHUNK_SIZE: usize = 16_000;
