//! Blob fetching
//!
//! The cache asks an `ImageFetcher` for bytes on a double miss. The default
//! implementation is a plain HTTP GET.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::HttpConfig;
use crate::error::AppError;

/// Source of raw image bytes for a URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError>;
}

/// Fetches images over HTTP(S)
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher with the configured user agent and timeout
    pub fn new(config: &HttpConfig) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let url = url::Url::parse(url)?;
        tracing::debug!(url = %url, "Fetching image");

        let response = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;

        Ok(bytes.to_vec())
    }
}
