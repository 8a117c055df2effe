#![cfg(feature = "client")]

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use reduct_batch::{ClientConfig, ProtocolVersion, QueryOptions, Record, ReductClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Server {
    queries: Arc<Mutex<Vec<Value>>>,
    fetches: Arc<AtomicUsize>,
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

async fn open_query(State(state): State<Server>, Json(body): Json<Value>) -> Json<Value> {
    state.queries.lock().unwrap().push(body);
    Json(json!({"id": 7}))
}

fn logging(config: ClientConfig) -> ClientConfig {
    ClientConfig {
        enable_logging: true,
        ..config
    }
}

#[tokio::test]
async fn test_v2_query_across_pages() {
    const BIG: usize = 100_000;

    async fn read(State(state): State<Server>, headers: HeaderMap) -> Response {
        assert_eq!(headers.get("x-reduct-query-id").unwrap(), "7");
        match state.fetches.fetch_add(1, Ordering::SeqCst) {
            0 => Response::builder()
                .header("x-reduct-entries", "entry-a,entry-b")
                .header("x-reduct-start-ts", "1000")
                .header("x-reduct-labels", "color")
                .header("x-reduct-1-0", "2,text/plain,0=red")
                .header("x-reduct-0-10", "1,text/plain")
                .header("x-reduct-0-20", "3,,0=blue")
                .body(Body::from("bcccaa"))
                .unwrap(),
            1 => {
                // last record arrives in many small chunks
                let chunks = (0..BIG / 1000).map(|_| Ok::<_, Infallible>(Bytes::from(vec![b'z'; 1000])));
                Response::builder()
                    .header("x-reduct-entries", "entry-a")
                    .header("x-reduct-start-ts", "5000")
                    .header("x-reduct-0-0", format!("{},application/octet-stream", BIG))
                    .header("x-reduct-last", "true")
                    .body(Body::from_stream(futures::stream::iter(chunks)))
                    .unwrap()
            }
            _ => Response::builder().status(204).body(Body::empty()).unwrap(),
        }
    }

    let state = Server::default();
    let app = Router::new()
        .route("/api/v1/io/:bucket/q", post(open_query))
        .route("/api/v1/io/:bucket/read", get(read))
        .with_state(state.clone());
    let url = serve(app).await;

    let bucket = ReductClient::new(logging(ClientConfig::new(url))).unwrap().bucket("bucket");
    let options = QueryOptions::new().with_start(1000).with_stop(10_000);
    let mut cursor = bucket.query(&["entry-a", "entry-b"][..], options).unwrap();

    let mut records: Vec<Record> = Vec::new();
    while let Some(record) = cursor.next().await {
        records.push(record.unwrap());
    }

    assert_eq!(records.len(), 4);
    assert_eq!((records[0].entry.as_str(), records[0].timestamp), ("entry-a", 1010));
    assert!(records[0].labels.is_empty());
    assert_eq!((records[1].entry.as_str(), records[1].timestamp), ("entry-a", 1020));
    assert_eq!(records[1].labels["color"], "blue");
    assert_eq!(records[1].content_type, "text/plain");
    assert_eq!((records[2].entry.as_str(), records[2].timestamp), ("entry-b", 1000));
    assert_eq!(records[2].labels["color"], "red");
    assert!(!records[2].last);
    assert_eq!((records[3].entry.as_str(), records[3].timestamp), ("entry-a", 5000));
    assert!(records[3].last);

    assert_eq!(records[0].read_all().await.unwrap().as_ref(), b"b");
    assert_eq!(records[1].read_all().await.unwrap().as_ref(), b"ccc");
    assert_eq!(records[2].read_all().await.unwrap().as_ref(), b"aa");

    let mut total = 0;
    let mut chunks = records[3].read_chunks(16_000).unwrap();
    while let Some(chunk) = chunks.next_chunk().await {
        let chunk = chunk.unwrap();
        assert!(chunk.len() <= 16_000);
        total += chunk.len();
    }
    assert_eq!(total, BIG);

    assert_eq!(state.fetches.load(Ordering::SeqCst), 2);
    let queries = state.queries.lock().unwrap();
    assert_eq!(
        queries[0],
        json!({"query_type": "QUERY", "entries": ["entry-a", "entry-b"], "start": 1000, "stop": 10000})
    );
}

#[tokio::test]
async fn test_v1_query() {
    async fn open(State(state): State<Server>, Json(body): Json<Value>) -> Json<Value> {
        state.queries.lock().unwrap().push(body);
        Json(json!({"id": 3}))
    }

    async fn read(State(state): State<Server>, Query(params): Query<HashMap<String, String>>) -> Response {
        assert_eq!(params["q"], "3");
        if state.fetches.fetch_add(1, Ordering::SeqCst) > 0 {
            return Response::builder().status(204).body(Body::empty()).unwrap();
        }
        Response::builder()
            .header("x-reduct-time-2000", "3,plain/text,label2=\"value,2\"")
            .header("x-reduct-time-1000", "4,plain/text,label1=value1")
            .body(Body::from("Hey,how"))
            .unwrap()
    }

    let state = Server::default();
    let app = Router::new()
        .route("/api/v1/b/:bucket/:entry/q", post(open))
        .route("/api/v1/b/:bucket/:entry/batch", get(read))
        .with_state(state.clone());
    let url = serve(app).await;

    let config = logging(ClientConfig::new(url)).with_batch_protocol(ProtocolVersion::V1);
    let bucket = ReductClient::new(config).unwrap().bucket("bucket");
    let records: Vec<Record> = bucket
        .query("entry", QueryOptions::default())
        .unwrap()
        .into_stream()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].timestamp, 1000);
    assert_eq!(records[0].labels["label1"], "value1");
    assert_eq!(records[1].timestamp, 2000);
    assert_eq!(records[1].labels["label2"], "value,2");
    // no end-of-query marker: the cursor stops on the empty page
    assert!(!records[1].last);
    assert_eq!(state.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_subscribe_receives_late_record() {
    async fn read(State(state): State<Server>) -> Response {
        if state.fetches.fetch_add(1, Ordering::SeqCst) < 2 {
            return Response::builder().status(204).body(Body::empty()).unwrap();
        }
        Response::builder()
            .header("x-reduct-entries", "entry")
            .header("x-reduct-start-ts", "42")
            .header("x-reduct-0-0", "4,text/plain")
            .header("x-reduct-last", "true")
            .body(Body::from("late"))
            .unwrap()
    }

    let state = Server::default();
    let app = Router::new()
        .route("/api/v1/io/:bucket/q", post(open_query))
        .route("/api/v1/io/:bucket/read", get(read))
        .with_state(state.clone());
    let url = serve(app).await;

    let bucket = ReductClient::new(logging(ClientConfig::new(url))).unwrap().bucket("bucket");
    let options = QueryOptions::new().with_poll_interval(Duration::from_millis(50));
    let mut cursor = bucket.subscribe("entry", options).unwrap();

    let mut record = tokio::time::timeout(Duration::from_secs(5), cursor.next())
        .await
        .expect("subscription timed out")
        .unwrap()
        .unwrap();
    assert_eq!(record.timestamp, 42);
    assert!(!record.last);
    assert_eq!(record.read_all().await.unwrap().as_ref(), b"late");
    assert!(state.fetches.load(Ordering::SeqCst) >= 3);

    let queries = state.queries.lock().unwrap();
    assert_eq!(queries[0]["continuous"], true);
    assert_eq!(queries[0]["ttl"], 2);
}

#[tokio::test]
async fn test_head_only_query() {
    async fn read(State(state): State<Server>) -> Response {
        state.fetches.fetch_add(1, Ordering::SeqCst);
        Response::builder()
            .header("x-reduct-entries", "entry")
            .header("x-reduct-start-ts", "1")
            .header("x-reduct-0-0", "5,text/plain")
            .header("x-reduct-0-1", "6")
            .header("x-reduct-last", "true")
            .body(Body::from("hello world"))
            .unwrap()
    }

    let state = Server::default();
    let app = Router::new()
        .route("/api/v1/io/:bucket/q", post(open_query))
        .route("/api/v1/io/:bucket/read", get(read))
        .with_state(state.clone());
    let url = serve(app).await;

    let bucket = ReductClient::new(logging(ClientConfig::new(url))).unwrap().bucket("bucket");
    let mut cursor = bucket.query("entry", QueryOptions::new().head_only()).unwrap();

    let mut sizes = Vec::new();
    while let Some(record) = cursor.next().await {
        let mut record = record.unwrap();
        assert!(record.read_all().await.unwrap().is_empty());
        sizes.push(record.size);
    }
    assert_eq!(sizes, vec![5, 6]);
}
