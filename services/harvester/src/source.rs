//! Where tile bytes come from.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use wms_protocol::GetMapRequest;

/// A remote map service that answers GetMap requests.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Fetch the raw response body for one tile.
    async fn fetch(&self, request: &GetMapRequest) -> Result<Bytes>;
}

/// WMS over HTTP.
pub struct HttpTileSource {
    client: Client,
    endpoint: String,
}

impl HttpTileSource {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(1)
            .tcp_nodelay(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(&self, request: &GetMapRequest) -> Result<Bytes> {
        let url = request.to_url(&self.endpoint);
        debug!(url = %url, "GetMap");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {}", status));
        }

        response
            .bytes()
            .await
            .context("Error reading response body")
    }
}
