//! HTTP client for SSE servers

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ClientError, Result};
use crate::streaming::{Connection, EventStream, EventTransport, StreamResult};

/// Path of the event stream on the server
pub const EVENTS_PATH: &str = "/events";

/// Path of the health probe on the server
pub const HEALTH_PATH: &str = "/health";

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for a server exposing an SSE stream at [`EVENTS_PATH`]
///
/// Only a connect timeout is set: a whole-request timeout would cut
/// long-lived streams.
#[derive(Debug, Clone)]
pub struct SseClient {
    client: Client,
    base_url: Url,
}

impl SseClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the server (e.g., "http://localhost:8080")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_connect_timeout(base_url, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with a custom connect timeout
    pub fn with_connect_timeout(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;

        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL of the event stream
    pub fn events_url(&self) -> Result<Url> {
        Ok(self.base_url.join(EVENTS_PATH)?)
    }

    /// Check server health
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<String> {
        let url = self.base_url.join(HEALTH_PATH)?;
        debug!("Probing health at {}", url);

        let response = self.client.get(url).send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::server_error(status, message))
        }
    }

    /// Open the event stream
    #[instrument(skip(self))]
    pub async fn connect(&self) -> StreamResult<Connection> {
        let url = self.base_url.join(EVENTS_PATH)?;
        Connection::open(&self.client, url).await
    }
}

#[async_trait]
impl EventTransport for SseClient {
    async fn open(&self) -> StreamResult<EventStream> {
        let connection = self.connect().await?;
        Ok(Box::pin(connection))
    }
}
