//! HTTP access to the AXDS services.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, instrument};

use axds_common::{AxdsError, AxdsResult};

/// Trait for anything that can fetch remote documents for the catalog.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a URL and decode the body as JSON.
    async fn get_json(&self, url: &str) -> AxdsResult<Value>;

    /// GET a URL and return the raw body.
    async fn get_bytes(&self, url: &str) -> AxdsResult<Bytes>;
}

/// reqwest-backed fetcher used against the real services.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> AxdsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| AxdsError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str, accept: &str) -> AxdsResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await
            .map_err(|e| AxdsError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AxdsError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn get_json(&self, url: &str) -> AxdsResult<Value> {
        let response = self.send(url, "application/json").await?;
        let body = response.bytes().await.map_err(|e| AxdsError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(size = body.len(), "Received JSON response");

        serde_json::from_slice(&body).map_err(|e| AxdsError::MalformedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn get_bytes(&self, url: &str) -> AxdsResult<Bytes> {
        let response = self.send(url, "*/*").await?;
        let body = response.bytes().await.map_err(|e| AxdsError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(size = body.len(), "Downloaded file");
        Ok(body)
    }
}

/// Decode a JSON value into a typed response, naming the URL on failure.
pub fn decode<T: serde::de::DeserializeOwned>(url: &str, value: Value) -> AxdsResult<T> {
    serde_json::from_value(value).map_err(|e| AxdsError::MalformedResponse {
        url: url.to_string(),
        message: e.to_string(),
    })
}
