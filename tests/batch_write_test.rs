#![cfg(feature = "client")]

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::post,
    Router,
};
use reduct_batch::{Batch, BatchItem, ClientConfig, ProtocolVersion, ReductClient, ReductError};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, HeaderMap, Bytes)>>>,
}

impl Captured {
    fn single(&self) -> (String, HeaderMap, Bytes) {
        let requests = self.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        requests[0].clone()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

async fn serve(app: Router) -> String {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reduct_batch=debug")
        .with_test_writer()
        .try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn logging(config: ClientConfig) -> ClientConfig {
    ClientConfig {
        enable_logging: true,
        ..config
    }
}

#[tokio::test]
async fn test_v2_batch_write() {
    async fn write(
        State(state): State<Captured>,
        Path(bucket): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        state.requests.lock().unwrap().push((bucket, headers, body));
        Response::builder()
            .header("x-reduct-error-0-1000", "409,A record with timestamp 2000 already exists")
            .body(Body::empty())
            .unwrap()
    }

    let state = Captured::default();
    let app = Router::new()
        .route("/api/v1/io/:bucket/write", post(write))
        .with_state(state.clone());
    let url = serve(app).await;

    let client = ReductClient::new(logging(ClientConfig::new(url)).with_api_token("secret")).unwrap();
    let bucket = client.bucket("sensors");

    let mut batch = Batch::new();
    batch.push(
        BatchItem::new(2000, "b")
            .with_entry("entry 2")
            .with_label("a", "x"),
    );
    batch.push(
        BatchItem::new(1000, "aa")
            .with_entry("entry-1")
            .with_content_type("text/plain")
            .with_label("a", "x"),
    );
    batch.push(BatchItem::new(1500, "ccc").with_entry("entry-1").with_content_type("text/plain"));

    let errors = bucket.write_batch(&batch, None).await.unwrap();
    assert_eq!(errors.len(), 1);
    let err = &errors[&("entry 2".to_string(), 2000)];
    assert_eq!(err.status, 409);
    assert_eq!(err.message, "A record with timestamp 2000 already exists");

    let (bucket_name, headers, body) = state.single();
    assert_eq!(bucket_name, "sensors");
    assert_eq!(header(&headers, "authorization"), "Bearer secret");
    assert_eq!(header(&headers, "x-reduct-entries"), "entry%202,entry-1");
    assert_eq!(header(&headers, "x-reduct-start-ts"), "1000");
    assert_eq!(header(&headers, "x-reduct-labels"), "a");
    assert_eq!(header(&headers, "x-reduct-0-1000"), "1,application/octet-stream,0=x");
    assert_eq!(header(&headers, "x-reduct-1-0"), "2,text/plain,0=x");
    assert_eq!(header(&headers, "x-reduct-1-500"), "3,,0=");
    assert_eq!(header(&headers, "content-length"), "6");
    assert_eq!(body.as_ref(), b"baaccc");
}

#[tokio::test]
async fn test_v1_batch_write() {
    async fn write(
        State(state): State<Captured>,
        Path((_, entry)): Path<(String, String)>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        state.requests.lock().unwrap().push((entry, headers, body));
        Response::builder()
            .header("x-reduct-error-2000", "409,A record with timestamp 2000 already exists")
            .body(Body::empty())
            .unwrap()
    }

    let state = Captured::default();
    let app = Router::new()
        .route("/api/v1/b/:bucket/:entry/batch", post(write))
        .with_state(state.clone());
    let url = serve(app).await;

    let config = logging(ClientConfig::new(url)).with_batch_protocol(ProtocolVersion::V1);
    let bucket = ReductClient::new(config).unwrap().bucket("sensors");

    let mut batch = Batch::new();
    batch.push(
        BatchItem::new(1000, "Hey,")
            .with_content_type("plain/text")
            .with_label("label1", "value1"),
    );
    batch.push(
        BatchItem::new(2000, "how")
            .with_content_type("plain/text")
            .with_label("label2", "value,2"),
    );

    let errors = bucket.write_batch(&batch, Some("entry")).await.unwrap();
    assert_eq!(errors[&("entry".to_string(), 2000)].status, 409);

    let (entry, headers, body) = state.single();
    assert_eq!(entry, "entry");
    assert_eq!(header(&headers, "x-reduct-time-1000"), "4,plain/text,label1=value1");
    assert_eq!(header(&headers, "x-reduct-time-2000"), "3,plain/text,label2=\"value,2\"");
    assert_eq!(header(&headers, "content-type"), "application/octet-stream");
    assert_eq!(body.as_ref(), b"Hey,how");
}

#[tokio::test]
async fn test_server_error_status() {
    async fn write() -> Response {
        Response::builder()
            .status(404)
            .header("x-reduct-error", "Bucket 'missing' is not found")
            .body(Body::empty())
            .unwrap()
    }

    let app = Router::new().route("/api/v1/io/:bucket/write", post(write));
    let url = serve(app).await;
    let bucket = ReductClient::new(logging(ClientConfig::new(url))).unwrap().bucket("missing");

    let mut batch = Batch::new();
    batch.add("entry", 1000, "x");
    match bucket.write_batch(&batch, None).await {
        Err(ReductError::Server { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "Bucket 'missing' is not found");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
