//! Main batch client.
//!
//! [`ReductClient`] owns the transport and the protocol-specific codec and
//! endpoints, picked once from [`ClientConfig::batch_protocol`].
//! [`Bucket`] scopes batch writes and queries to one bucket.

use crate::core::client::config::ClientConfig;
use crate::core::client::cursor::QueryCursor;
use crate::core::client::endpoints::{endpoints_for, Endpoints};
use crate::core::error::{RecordErrors, ReductError, Result};
use crate::core::protocol::constants::SERVER_ERROR_HEADER;
use crate::core::protocol::{BatchCodec, ProtocolVersion};
use crate::core::traits::ReductNetwork;
use crate::core::types::{Batch, EntrySelector, QueryOptions, ReductRequest, ReductResponse};
use std::sync::Arc;

/// Client for the batch protocol.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct ReductClient {
    network: Arc<dyn ReductNetwork>,
    config: Arc<ClientConfig>,
    codec: Arc<dyn BatchCodec>,
    endpoints: Arc<dyn Endpoints>,
}

impl ReductClient {
    /// Create a client with a `reqwest` transport.
    #[cfg(feature = "client")]
    pub fn new(config: ClientConfig) -> Result<Self> {
        let network = crate::core::client::NativeNetwork::new(&config)?;
        Ok(Self::with_network(config, Arc::new(network)))
    }

    /// Create a client on top of any transport.
    pub fn with_network(config: ClientConfig, network: Arc<dyn ReductNetwork>) -> Self {
        let version = config.batch_protocol;
        ReductClient {
            network,
            config: Arc::new(config),
            codec: version.codec(),
            endpoints: endpoints_for(version),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.codec.version()
    }

    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket {
            client: self.clone(),
            name: name.into(),
        }
    }

    pub(crate) fn codec(&self) -> &dyn BatchCodec {
        self.codec.as_ref()
    }

    pub(crate) fn endpoints(&self) -> &dyn Endpoints {
        self.endpoints.as_ref()
    }

    /// Send a request with the configured auth and extra headers.
    ///
    /// Statuses >= 400 become [`ReductError::Server`] with the message of the
    /// `x-reduct-error` header.
    pub(crate) async fn send(&self, mut request: ReductRequest) -> Result<ReductResponse> {
        for (k, v) in &self.config.extra_headers {
            request
                .headers
                .entry(k.to_ascii_lowercase())
                .or_insert_with(|| v.clone());
        }
        if let Some(token) = &self.config.api_token {
            request
                .headers
                .insert("authorization".to_string(), format!("Bearer {}", token));
        }

        if self.config.enable_logging {
            tracing::debug!(method = %request.method, path = %request.path, "Sending request");
        }

        let response = self.network.send(request).await?;
        if response.status >= 400 {
            let message = response
                .header(SERVER_ERROR_HEADER)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(ReductError::Server {
                status: response.status,
                message,
            });
        }
        Ok(response)
    }
}

impl std::fmt::Debug for ReductClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReductClient")
            .field("url", &self.config.url)
            .field("batch_protocol", &self.codec.version())
            .finish()
    }
}

/// A bucket on the server.
#[derive(Clone, Debug)]
pub struct Bucket {
    client: ReductClient,
    name: String,
}

impl Bucket {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a batch in one request.
    ///
    /// Items without an entry go to `default_entry`. Failures of single
    /// records don't fail the call; they are returned keyed by
    /// `(entry, timestamp)`. An empty batch sends nothing.
    pub async fn write_batch(&self, batch: &Batch, default_entry: Option<&str>) -> Result<RecordErrors> {
        if batch.is_empty() {
            return Ok(RecordErrors::new());
        }
        let encoded = self.client.codec().encode(batch, default_entry)?;

        let request = self
            .client
            .endpoints()
            .write(&self.name, &encoded.entries)?
            .with_headers(encoded.headers.clone())
            .with_body(encoded.body.clone());

        let response = self.client.send(request).await?;
        let errors = self.client.codec().decode_errors(&response.headers, &encoded)?;

        if self.client.config().enable_logging {
            for ((entry, timestamp), err) in &errors {
                tracing::warn!(
                    bucket = %self.name,
                    entry = %entry,
                    timestamp,
                    status = err.status,
                    "Failed to write record: {}",
                    err.message
                );
            }
        }
        Ok(errors)
    }

    /// Query records of one or more entries.
    ///
    /// The query is opened on the first call to [`QueryCursor::next`].
    pub fn query(&self, entries: impl Into<EntrySelector>, options: QueryOptions) -> Result<QueryCursor> {
        let entries = entries.into().resolve()?;
        Ok(QueryCursor::new(self.client.clone(), self.name.clone(), entries, options))
    }

    /// Follow new records as they are written.
    ///
    /// Same as [`Bucket::query`] in continuous mode: the cursor never ends
    /// and polls every `options.poll_interval` while there is nothing new.
    pub fn subscribe(&self, entries: impl Into<EntrySelector>, options: QueryOptions) -> Result<QueryCursor> {
        self.query(entries, options.continuous())
    }
}
