//! Authenticated request execution.
//!
//! [`RequestGateway`] is the only path from the terminal to the backend. It
//! attaches credentials, enforces the request timeout and refuses to touch
//! the network while the link is down. It does not decode bodies and never
//! retries; both belong to the caller.

use std::time::{Duration, Instant};

use tapterm_core::constants::{
    CONTENT_TYPE_JSON, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE, HEADER_DEVICE_ID,
};
use tapterm_core::{ConnectivityError, DeviceId};
use tracing::{debug, warn};

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method};

/// Read-only view of link availability, checked before every call.
pub trait LinkStatus {
    fn is_available(&self) -> bool;
}

impl LinkStatus for bool {
    fn is_available(&self) -> bool {
        *self
    }
}

/// Builds and executes authenticated backend requests.
pub struct RequestGateway<T> {
    transport: T,
    base_url: String,
    api_token: String,
    device_id: DeviceId,
    timeout: Duration,
}

impl<T> std::fmt::Debug for RequestGateway<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<T: HttpTransport> RequestGateway<T> {
    pub fn new(
        transport: T,
        base_url: &str,
        api_token: impl Into<String>,
        device_id: DeviceId,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            device_id,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one request against `endpoint` (a path, optionally with a
    /// query string).
    ///
    /// Any HTTP status that was actually received is returned as `Ok`; the
    /// caller decides what a non-2xx status means.
    ///
    /// # Errors
    ///
    /// - `ConnectivityError::LinkDown` when `link` is unavailable. No request
    ///   is attempted.
    /// - `ConnectivityError::Timeout` when no response arrives in time.
    /// - `ConnectivityError::Transport` for any other transport failure.
    pub async fn send(
        &self,
        link: &impl LinkStatus,
        endpoint: &str,
        method: Method,
        body: Option<String>,
    ) -> Result<HttpResponse, ConnectivityError> {
        if !link.is_available() {
            debug!(endpoint, "Link down, request not sent");
            return Err(ConnectivityError::LinkDown);
        }

        let request = self.build(endpoint, method, body);
        let timeout_ms = self.timeout.as_millis() as u64;
        let started = Instant::now();

        let result = match tokio::time::timeout(self.timeout, self.transport.execute(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectivityError::Timeout { timeout_ms }),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(response) => {
                debug!(%method, endpoint, status = response.status, elapsed_ms, "Backend call completed");
            }
            Err(e) => {
                warn!(%method, endpoint, elapsed_ms, error = %e, "Backend call failed");
            }
        }
        result
    }

    fn build(&self, endpoint: &str, method: Method, body: Option<String>) -> HttpRequest {
        let url = if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        };

        HttpRequest {
            method,
            url,
            headers: vec![
                (HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string()),
                (
                    HEADER_AUTHORIZATION.to_string(),
                    format!("Bearer {}", self.api_token),
                ),
                (
                    HEADER_DEVICE_ID.to_string(),
                    self.device_id.as_str().to_string(),
                ),
            ],
            body,
            timeout: self.timeout,
        }
    }
}
