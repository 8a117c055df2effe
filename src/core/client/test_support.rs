//! In-memory transport for client tests.

use crate::core::error::Result;
use crate::core::traits::ReductNetwork;
use crate::core::types::{BodyReader, ReductRequest, ReductResponse};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A canned response.
#[derive(Clone, Debug)]
pub(crate) struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl ScriptedResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::status(200)
    }

    pub fn no_content() -> Self {
        Self::status(204)
    }

    pub fn json(body: &str) -> Self {
        Self::ok()
            .with_header("content-type", "application/json")
            .with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Bytes::copy_from_slice(body.as_bytes());
        self
    }

    fn into_response(self) -> ReductResponse {
        self.headers.into_iter().fold(
            ReductResponse::new(self.status, BodyReader::from_bytes(self.body)),
            |response, (name, value)| response.with_header(name, value),
        )
    }
}

/// Replays responses in order and records every request.
///
/// Answers 204 once the script runs out.
#[derive(Debug, Default)]
pub(crate) struct ScriptedNetwork {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<ReductRequest>>,
}

impl ScriptedNetwork {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ReductRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReductNetwork for ScriptedNetwork {
    async fn send(&self, request: ReductRequest) -> Result<ReductResponse> {
        self.requests.lock().unwrap().push(request);
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(ScriptedResponse::no_content).into_response())
    }
}
