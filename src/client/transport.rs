//! HTTP transport seam.
//!
//! The pipeline core does not implement HTTP; it calls through the
//! narrow [`Transport`] trait and gets back a [`RawResponse`] — status
//! code, headers, body. [`HttpTransport`] is the stock implementation
//! over [`reqwest`]; tests substitute their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::Result;

pub use reqwest::Method;

/// Default request timeout for the stock transport.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What came back over the wire, unparsed.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Sends one request and returns the raw response.
///
/// A transport failure (connection refused, DNS, timeout) surfaces as
/// [`BifrostError::Transport`](crate::BifrostError::Transport); a
/// response with any status code is a successful send.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<RawResponse>;
}

/// Stock [`Transport`] over a shared [`reqwest::Client`].
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// Use a pre-configured client (proxies, custom TLS, timeouts).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        headers: &[(String, String)],
    ) -> Result<RawResponse> {
        let mut request = self.client.request(method, uri);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    value.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
