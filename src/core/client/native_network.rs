use crate::core::client::config::ClientConfig;
use crate::core::error::{ReductError, Result};
use crate::core::traits::ReductNetwork;
use crate::core::types::{BodyReader, Method, ReductRequest, ReductResponse};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// [`ReductNetwork`] over `reqwest`.
///
/// Response bodies are not buffered: they are handed over as a byte stream.
pub struct NativeNetwork {
    client: Client,
    base_url: Url,
}

impl NativeNetwork {
    /// Build a `reqwest` client from the pool and timeout settings of `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_secs(config.connection_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.max_idle_connections)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| ReductError::Http(e.to_string()))?;

        Self::with_client(client, &config.url)
    }

    /// Wrap an existing `reqwest` client.
    pub fn with_client(client: Client, url: &str) -> Result<Self> {
        let mut base_url = Url::parse(url)
            .map_err(|e| ReductError::Config(format!("Invalid server URL '{}': {}", url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, request: &ReductRequest) -> Result<Url> {
        let mut url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|e| ReductError::Config(format!("Invalid path '{}': {}", request.path, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl ReductNetwork for NativeNetwork {
    async fn send(&self, request: ReductRequest) -> Result<ReductResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
        };
        let url = self.url_for(&request)?;

        let mut req_builder = self.client.request(method, url);
        for (k, v) in &request.headers {
            req_builder = req_builder.header(k, v);
        }
        if request.method == Method::Post {
            req_builder = req_builder.body(request.body);
        }

        let response = req_builder
            .send()
            .await
            .map_err(|e| ReductError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let mut headers = std::collections::BTreeMap::new();
        for (k, v) in response.headers() {
            if let Ok(val) = v.to_str() {
                headers.insert(k.as_str().to_ascii_lowercase(), val.to_string());
            }
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ReductError::Http(e.to_string())));

        Ok(ReductResponse {
            status,
            headers,
            body: BodyReader::new(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_keeps_prefix() {
        let network = NativeNetwork::with_client(Client::new(), "http://localhost:8383/reduct").unwrap();
        let request = ReductRequest::get("/api/v1/io/bucket/read");
        assert_eq!(
            network.url_for(&request).unwrap().as_str(),
            "http://localhost:8383/reduct/api/v1/io/bucket/read"
        );
    }

    #[test]
    fn test_url_with_query() {
        let network = NativeNetwork::with_client(Client::new(), "http://localhost:8383").unwrap();
        let request = ReductRequest::get("/api/v1/b/bucket/entry/batch").with_query("q", "5");
        assert_eq!(
            network.url_for(&request).unwrap().as_str(),
            "http://localhost:8383/api/v1/b/bucket/entry/batch?q=5"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            NativeNetwork::with_client(Client::new(), "not a url"),
            Err(ReductError::Config(_))
        ));
    }
}
