use std::time::Duration;

use reqwest::{Client, Response};
use tokio::time::timeout;

use crate::error::ValidationError;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: format!("kml-validator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Async HTTP client for downloading remote schemas.
///
/// Each download is a single attempt: an unreachable schema source is
/// reported once and never retried here.
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    /// Create a new async HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(ValidationError::from)?;

        Ok(Self { client, config })
    }

    /// Download schema bytes from `url`
    pub async fn download_schema(&self, url: &str) -> Result<Vec<u8>, ValidationError> {
        let response = self.make_request(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ValidationError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            });
        }

        let bytes = response.bytes().await.map_err(ValidationError::from)?;
        tracing::debug!(url, bytes = bytes.len(), "downloaded schema");
        Ok(bytes.to_vec())
    }

    /// Make a single HTTP request with timeout
    async fn make_request(&self, url: &str) -> Result<Response, ValidationError> {
        let request_future = self.client.get(url).send();

        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            request_future,
        )
        .await
        .map_err(|_| ValidationError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(ValidationError::from)
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
