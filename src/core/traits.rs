use crate::core::error::Result;
use crate::core::types::{ReductRequest, ReductResponse};
use async_trait::async_trait;

/// Abstraction for the HTTP transport.
///
/// Connection pooling, TLS and transport-level retries live behind this
/// trait. Implementations return every status as a response; the client
/// turns statuses >= 400 into [`ReductError::Server`](crate::ReductError::Server).
/// The body must be handed back unread so batched records can be streamed.
#[async_trait]
pub trait ReductNetwork: Send + Sync + 'static {
    /// Send a request and return the response with an unread body.
    async fn send(&self, request: ReductRequest) -> Result<ReductResponse>;
}
