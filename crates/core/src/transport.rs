//! Shared HTTP transport used by the built-in providers.
//!
//! A single `reqwest` client with a cookie jar is shared by every provider
//! task; `reqwest::Client` is internally reference counted and safe to use
//! concurrently.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;

/// Desktop browser user agent; several providers reject unknown agents.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:98.0) Gecko/20100101 Firefox/98.0";

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// Errors raised by the transport itself (never by HTTP status codes).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to create HTTP client: {0}")]
    Build(String),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Cheaply cloneable handle to the shared HTTP client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport with a cookie jar, the given user agent and timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }

    /// Build a transport from configuration.
    pub fn from_config(config: &HttpConfig) -> Result<Self, TransportError> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(u64::from(config.timeout_secs)),
        )
    }

    /// Build a transport with the default user agent and timeout.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(
            DEFAULT_USER_AGENT,
            Duration::from_secs(u64::from(DEFAULT_TIMEOUT_SECS)),
        )
    }

    /// Wrap an externally configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// GET `url` with query parameters.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<HttpResponse, TransportError> {
        self.get_with_headers(url, params, &[]).await
    }

    /// GET `url` with query parameters and extra headers.
    pub async fn get_with_headers(
        &self,
        url: &str,
        params: &[(&str, String)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
            header_map.insert(name, value);
        }

        debug!(url = url, params = params.len(), "HTTP GET");

        let response = self
            .client
            .get(url)
            .query(params)
            .headers(header_map)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        url: url.to_string(),
                    }
                } else if e.is_connect() {
                    TransportError::ConnectionFailed {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                } else {
                    TransportError::Request {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: final_url.clone(),
            message: e.to_string(),
        })?;

        Ok(HttpResponse {
            status,
            url: final_url,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_success_range() {
        let ok = HttpResponse {
            status: 204,
            url: "http://localhost".to_string(),
            body: String::new(),
        };
        assert!(ok.is_success());

        let not_found = HttpResponse {
            status: 404,
            ..ok.clone()
        };
        assert!(!not_found.is_success());
    }

    #[test]
    fn test_response_json() {
        let response = HttpResponse {
            status: 200,
            url: "http://localhost".to_string(),
            body: r#"{"token": "abc"}"#.to_string(),
        };
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["token"], "abc");
    }

    #[test]
    fn test_transport_from_config() {
        let config = HttpConfig {
            user_agent: "test-agent".to_string(),
            timeout_secs: 5,
        };
        assert!(HttpTransport::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected() {
        let transport = HttpTransport::with_defaults().unwrap();
        let result = transport
            .get_with_headers("http://127.0.0.1:1", &[], &[("bad header", "x")])
            .await;
        assert!(matches!(result, Err(TransportError::InvalidHeader(_))));
    }
}
