//! Extract proxy client
//!
//! Every upstream request (record lookup and photo download) goes through a
//! single extract proxy that replies with an envelope carrying the upstream
//! HTTP body as base64.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during a proxy round trip
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Connectivity problem talking to the proxy
    #[error("Proxy network error: {0}")]
    Network(String),
    /// Proxy answered with a non-success status
    #[error("Proxy error: {0}")]
    Status(String),
    /// Round trip exceeded the configured timeout
    #[error("Proxy request timed out after {0:?}")]
    Timeout(Duration),
    /// Envelope could not be decoded
    #[error("Invalid proxy envelope: {0}")]
    Envelope(String),
}

/// Request body sent to the extract proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    /// Upstream URL to fetch
    pub url: String,
    /// Ask the proxy to return the raw upstream body
    pub http_response_body: bool,
    /// Country the upstream request should originate from
    pub geolocation: String,
}

impl ExtractRequest {
    /// Request for the raw body of `url`
    #[must_use]
    pub fn raw_body(url: impl Into<String>, geolocation: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http_response_body: true,
            geolocation: geolocation.into(),
        }
    }
}

/// Envelope returned by the extract proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractEnvelope {
    /// HTTP status of the upstream response, when reported
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Base64-encoded upstream body
    #[serde(default)]
    pub http_response_body: Option<String>,
}

impl ExtractEnvelope {
    /// Decode the inner upstream body.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Envelope` if the body is missing or not valid base64.
    pub fn decode_body(&self) -> Result<Vec<u8>, ProxyError> {
        let encoded = self
            .http_response_body
            .as_deref()
            .ok_or_else(|| ProxyError::Envelope("missing httpResponseBody".to_string()))?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| ProxyError::Envelope(format!("base64 decode failed: {e}")))
    }

    /// Whether the upstream status (if reported) is a success
    #[must_use]
    pub fn upstream_ok(&self) -> bool {
        self.status_code.is_none_or(|code| (200..300).contains(&code))
    }
}

/// Interface for the extract proxy
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    /// Perform one extract round trip
    async fn extract(&self, request: ExtractRequest) -> Result<ExtractEnvelope, ProxyError>;
}

/// Zyte-compatible extract proxy over HTTPS
pub struct ZyteProxy {
    client: HttpClient,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl ZyteProxy {
    /// Creates a proxy client whose requests are bounded by `timeout`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| HttpClient::new());

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProxyTransport for ZyteProxy {
    async fn extract(&self, request: ExtractRequest) -> Result<ExtractEnvelope, ProxyError> {
        debug!(url = %request.url, "Proxy extract request");

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.api_key, Some(""))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::Timeout(self.timeout)
                } else {
                    ProxyError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let is_html = error_text.trim_start().starts_with("<!DOCTYPE")
                || error_text.trim_start().starts_with("<html");
            let detail = if is_html {
                "(proxy returned HTML error page)".to_string()
            } else {
                crate::utils::truncate_str(&error_text, 300)
            };
            return Err(ProxyError::Status(format!("{status} {detail}")));
        }

        response
            .json::<ExtractEnvelope>()
            .await
            .map_err(|e| ProxyError::Envelope(e.to_string()))
    }
}
