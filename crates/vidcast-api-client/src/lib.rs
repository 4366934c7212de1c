//! Shared HTTP client for the Vidcast API.
//!
//! Provides the API client used to register and publish uploads, and the
//! chunked uploader that writes a local file to the signed upload URL.
//! The CLI uses both directly.

pub mod api;
pub mod upload;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Path prefix of the asset endpoints.
pub const API_PREFIX: &str = "/api";

/// Timeout of ordinary API requests.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Publish blocks until the encode job ends. Longer than the server's
/// default job timeout.
const PUBLISH_TIMEOUT_SECS: u64 = 3600 + 60;

/// HTTP client for the Vidcast API.
///
/// The underlying client only bounds connection setup; each request sets
/// its own overall timeout.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    publish_timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            publish_timeout: Duration::from_secs(PUBLISH_TIMEOUT_SECS),
        })
    }

    /// Create client from environment: VIDCAST_API_URL (or API_URL), and
    /// PUBLISH_TIMEOUT_SECS for how long a publish may wait on the encode.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("VIDCAST_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| "http://localhost:4000".to_string());

        let mut client = Self::new(base_url)?;
        if let Ok(raw) = std::env::var("PUBLISH_TIMEOUT_SECS") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("Invalid PUBLISH_TIMEOUT_SECS '{}'", raw))?;
            client = client.with_publish_timeout(Duration::from_secs(secs));
        }
        Ok(client)
    }

    /// Overall timeout of every request except `publish`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How long `publish` waits for the server to finish encoding.
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.post_json_with_timeout(path, body, self.request_timeout)
            .await
    }

    /// POST JSON body with an explicit overall timeout.
    pub async fn post_json_with_timeout<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let body: T = response
            .json()
            .await
            .context("Failed to parse response as JSON")?;

        Ok(body)
    }

    /// Raw client, shared with the uploader.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

pub use api::UploadOutcome;
pub use upload::{ChunkUploader, UploadError, UploadReceipt, UploadSession, UploaderConfig};
pub use vidcast_core::models::{CreateAssetResponse, PublishResponse};
