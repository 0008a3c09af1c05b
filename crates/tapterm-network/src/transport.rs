//! HTTP transport seam.
//!
//! The byte-level exchange with the backend sits behind [`HttpTransport`] so
//! the gateway's policy (credentials, timeout, fail-fast) can be exercised
//! with an in-memory transport. [`ReqwestTransport`] is the production
//! implementation.

#![allow(async_fn_in_trait)]

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use tapterm_core::ConnectivityError;
use tracing::debug;

/// Request methods used by the backend surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Fully built request, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// First header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status and undecoded body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes one request. Implementations do not retry.
pub trait HttpTransport {
    /// # Errors
    ///
    /// Returns `ConnectivityError::Timeout` or `ConnectivityError::Transport`
    /// when no response was received. Any received status is `Ok`.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ConnectivityError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns `ConnectivityError::Transport` if the TLS backend cannot be
    /// initialised.
    pub fn new(connect_timeout: Duration) -> Result<Self, ConnectivityError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()
            .map_err(|e| ConnectivityError::transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ConnectivityError> {
        let timeout_ms = request.timeout.as_millis() as u64;
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ConnectivityError::Timeout { timeout_ms }
            } else {
                ConnectivityError::transport(e.to_string())
            }
        };

        let response = builder.send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_err)?;
        debug!(status, bytes = body.len(), "Response received");

        Ok(HttpResponse { status, body })
    }
}
