//! HTTP endpoints of each batch protocol version.
//!
//! | Operation | v1 | v2 |
//! |-----------|----|----|
//! | write | `POST /api/v1/b/{bucket}/{entry}/batch` | `POST /api/v1/io/{bucket}/write` |
//! | open query | `POST /api/v1/b/{bucket}/{entry}/q` | `POST /api/v1/io/{bucket}/q` |
//! | fetch | `GET\|HEAD /api/v1/b/{bucket}/{entry}/batch?q={id}` | `GET\|HEAD /api/v1/io/{bucket}/read` + `x-reduct-query-id` |

use crate::core::client::utils::encode_path_segment;
use crate::core::error::{ReductError, Result};
use crate::core::protocol::constants::{CONTENT_TYPE_HEADER, QUERY_ID_HEADER};
use crate::core::protocol::ProtocolVersion;
use crate::core::types::{QueryOptions, ReductRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request builders for one protocol version.
pub trait Endpoints: Send + Sync + std::fmt::Debug {
    fn write(&self, bucket: &str, entries: &[String]) -> Result<ReductRequest>;

    fn open_query(&self, bucket: &str, entries: &[String], options: &QueryOptions) -> Result<ReductRequest>;

    fn fetch(&self, bucket: &str, entries: &[String], query_id: &str, head_only: bool) -> Result<ReductRequest>;
}

pub fn endpoints_for(version: ProtocolVersion) -> Arc<dyn Endpoints> {
    match version {
        ProtocolVersion::V1 => Arc::new(EndpointsV1),
        ProtocolVersion::V2 => Arc::new(EndpointsV2),
    }
}

/// JSON body of an open-query request.
#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub each_n: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub each_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuous: Option<bool>,
}

impl<'a> QueryRequest<'a> {
    pub fn new(options: &'a QueryOptions, entries: Option<&'a [String]>) -> Self {
        Self {
            query_type: "QUERY",
            entries,
            start: options.start,
            stop: options.stop,
            ttl: options.effective_ttl(),
            when: options.when.as_ref(),
            strict: options.strict,
            limit: options.limit,
            each_n: options.each_n,
            each_s: options.each_s,
            continuous: options.continuous.then_some(true),
        }
    }
}

/// Response to an open-query request.
#[derive(Debug, Deserialize)]
pub(crate) struct QueryInfo {
    pub id: u64,
}

fn json_post(path: String, body: &QueryRequest<'_>) -> Result<ReductRequest> {
    Ok(ReductRequest::post(path)
        .with_header(CONTENT_TYPE_HEADER, "application/json")
        .with_body(serde_json::to_vec(body)?))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointsV1;

impl EndpointsV1 {
    fn single_entry<'a>(&self, entries: &'a [String]) -> Result<&'a str> {
        match entries {
            [entry] => Ok(entry.as_str()),
            _ => Err(ReductError::Resolution(format!(
                "Batch protocol v1 works with exactly one entry, got {}",
                entries.len()
            ))),
        }
    }

    fn entry_path(&self, bucket: &str, entry: &str, action: &str) -> String {
        format!(
            "/api/v1/b/{}/{}/{}",
            encode_path_segment(bucket),
            encode_path_segment(entry),
            action
        )
    }
}

impl Endpoints for EndpointsV1 {
    fn write(&self, bucket: &str, entries: &[String]) -> Result<ReductRequest> {
        let entry = self.single_entry(entries)?;
        Ok(ReductRequest::post(self.entry_path(bucket, entry, "batch")))
    }

    fn open_query(&self, bucket: &str, entries: &[String], options: &QueryOptions) -> Result<ReductRequest> {
        let entry = self.single_entry(entries)?;
        json_post(self.entry_path(bucket, entry, "q"), &QueryRequest::new(options, None))
    }

    fn fetch(&self, bucket: &str, entries: &[String], query_id: &str, head_only: bool) -> Result<ReductRequest> {
        let entry = self.single_entry(entries)?;
        let path = self.entry_path(bucket, entry, "batch");
        let request = if head_only {
            ReductRequest::head(path)
        } else {
            ReductRequest::get(path)
        };
        Ok(request.with_query("q", query_id))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointsV2;

impl EndpointsV2 {
    fn io_path(&self, bucket: &str, action: &str) -> String {
        format!("/api/v1/io/{}/{}", encode_path_segment(bucket), action)
    }
}

impl Endpoints for EndpointsV2 {
    fn write(&self, bucket: &str, _entries: &[String]) -> Result<ReductRequest> {
        Ok(ReductRequest::post(self.io_path(bucket, "write")))
    }

    fn open_query(&self, bucket: &str, entries: &[String], options: &QueryOptions) -> Result<ReductRequest> {
        json_post(self.io_path(bucket, "q"), &QueryRequest::new(options, Some(entries)))
    }

    fn fetch(&self, bucket: &str, _entries: &[String], query_id: &str, head_only: bool) -> Result<ReductRequest> {
        let path = self.io_path(bucket, "read");
        let request = if head_only {
            ReductRequest::head(path)
        } else {
            ReductRequest::get(path)
        };
        Ok(request.with_header(QUERY_ID_HEADER, query_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Method;
    use serde_json::json;
    use std::time::Duration;

    fn entries(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn body_json(request: &ReductRequest) -> serde_json::Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    // ========== V1 Tests ==========

    #[test]
    fn test_v1_paths() {
        let e = entries(&["entry 1"]);
        let write = EndpointsV1.write("bucket", &e).unwrap();
        assert_eq!(write.method, Method::Post);
        assert_eq!(write.path, "/api/v1/b/bucket/entry%201/batch");

        let fetch = EndpointsV1.fetch("bucket", &e, "42", true).unwrap();
        assert_eq!(fetch.method, Method::Head);
        assert_eq!(fetch.path, "/api/v1/b/bucket/entry%201/batch");
        assert_eq!(fetch.query, vec![("q".to_string(), "42".to_string())]);
    }

    #[test]
    fn test_v1_needs_single_entry() {
        let e = entries(&["a", "b"]);
        assert!(matches!(
            EndpointsV1.open_query("bucket", &e, &QueryOptions::default()),
            Err(ReductError::Resolution(_))
        ));
        assert!(EndpointsV1.write("bucket", &[]).is_err());
    }

    #[test]
    fn test_v1_query_body_has_no_entries() {
        let request = EndpointsV1
            .open_query("bucket", &entries(&["e"]), &QueryOptions::new().with_start(10))
            .unwrap();
        assert_eq!(request.path, "/api/v1/b/bucket/e/q");
        assert_eq!(body_json(&request), json!({"query_type": "QUERY", "start": 10}));
    }

    // ========== V2 Tests ==========

    #[test]
    fn test_v2_paths() {
        let e = entries(&["a", "b"]);
        assert_eq!(EndpointsV2.write("bucket", &e).unwrap().path, "/api/v1/io/bucket/write");

        let fetch = EndpointsV2.fetch("bucket", &e, "7", false).unwrap();
        assert_eq!(fetch.method, Method::Get);
        assert_eq!(fetch.path, "/api/v1/io/bucket/read");
        assert_eq!(fetch.header("x-reduct-query-id"), Some("7"));
        assert!(fetch.query.is_empty());
    }

    #[test]
    fn test_v2_query_body() {
        let options = QueryOptions::new()
            .with_start(1000)
            .with_stop(2000)
            .with_when(json!({"&label": {"$gt": 1}}))
            .with_limit(5)
            .continuous()
            .with_poll_interval(Duration::from_secs(1));

        let request = EndpointsV2
            .open_query("bucket", &entries(&["a", "b"]), &options)
            .unwrap();
        assert_eq!(request.path, "/api/v1/io/bucket/q");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(
            body_json(&request),
            json!({
                "query_type": "QUERY",
                "entries": ["a", "b"],
                "start": 1000,
                "stop": 2000,
                "ttl": 3,
                "when": {"&label": {"$gt": 1}},
                "limit": 5,
                "continuous": true,
            })
        );
    }

    #[test]
    fn test_query_info_parse() {
        let info: QueryInfo = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert_eq!(info.id, 12);
    }
}
