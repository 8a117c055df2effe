//! HTTP response with a streamed body.

use crate::core::protocol::constants::LAST_HEADER;
use crate::core::types::body::BodyReader;
use std::collections::BTreeMap;

/// Response returned by a [`ReductNetwork`](crate::core::traits::ReductNetwork).
///
/// Header names are stored lower-cased. The body is left unread so that the
/// last record of a batch can be streamed without buffering it.
#[derive(Debug)]
pub struct ReductResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: BodyReader,
}

impl ReductResponse {
    pub fn new(status: u16, body: BodyReader) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 204: the query has no records right now.
    #[inline]
    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    /// `x-reduct-last: true` marks the final page of a query.
    pub fn is_end_of_query(&self) -> bool {
        self.header(LAST_HEADER)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Split into headers and body.
    pub fn into_parts(self) -> (u16, BTreeMap<String, String>, BodyReader) {
        (self.status, self.headers, self.body)
    }
}
