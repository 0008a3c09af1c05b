//! Host network link.
//!
//! On a host there is no radio to associate, so the link counts as up while
//! the backend's TCP port accepts connections. A background probe keeps the
//! cached state current between liveness checks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::Url;
use tapterm_core::{Error, Result};
use tapterm_hardware::LinkDriver;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
struct ProbeState {
    connected: AtomicBool,
    local_address: Mutex<Option<String>>,
}

/// [`LinkDriver`] backed by TCP reachability of the backend host.
#[derive(Debug, Clone)]
pub struct HostLink {
    target: String,
    state: Arc<ProbeState>,
}

impl HostLink {
    /// Link towards the host and port of `base_url`. Starts disconnected.
    ///
    /// # Errors
    ///
    /// `Error::Config` when the URL has no host.
    pub fn new(base_url: &str) -> Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid backend url '{base_url}': {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("backend url '{base_url}' has no host")))?;
        let port = url.port_or_known_default().unwrap_or(80);

        Ok(Self {
            target: format!("{host}:{port}"),
            state: Arc::default(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Try one connection, waiting at most `max_wait`, and record the result.
    pub async fn probe(&self, max_wait: Duration) -> bool {
        let local = match tokio::time::timeout(max_wait, TcpStream::connect(&self.target)).await {
            Ok(Ok(stream)) => stream.local_addr().ok().map(|addr| addr.ip().to_string()),
            Ok(Err(e)) => {
                debug!(target = %self.target, error = %e, "Backend unreachable");
                None
            }
            Err(_) => {
                debug!(target = %self.target, "Backend probe timed out");
                None
            }
        };

        let up = local.is_some();
        self.state.connected.store(up, Ordering::Release);
        *self
            .state
            .local_address
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = local;
        up
    }

    /// Re-probe every `period` until the returned task is aborted.
    pub fn spawn_probe(&self, period: Duration) -> JoinHandle<()> {
        let link = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                link.probe(period).await;
            }
        })
    }
}

impl LinkDriver for HostLink {
    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }

    async fn reconnect(&mut self, max_wait: Duration) -> tapterm_hardware::Result<bool> {
        Ok(self.probe(max_wait).await)
    }

    fn local_address(&self) -> Option<String> {
        self.state
            .local_address
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::net::TcpListener;

    #[rstest]
    #[case("http://192.168.43.202:8000/api", "192.168.43.202:8000")]
    #[case("http://backend.local/api", "backend.local:80")]
    #[case("https://pay.example.com/api/", "pay.example.com:443")]
    fn test_target_from_base_url(#[case] base_url: &str, #[case] target: &str) {
        assert_eq!(HostLink::new(base_url).unwrap().target(), target);
    }

    #[test]
    fn test_url_without_host_is_rejected() {
        assert!(matches!(HostLink::new("not a url"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_probe_reports_listening_backend() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut link = HostLink::new(&format!("http://127.0.0.1:{port}/api")).unwrap();
        assert!(!link.is_connected());

        assert!(link.reconnect(Duration::from_secs(1)).await.unwrap());
        assert!(link.is_connected());
        assert_eq!(link.local_address().as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_probe_drops_state_when_backend_goes_away() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let link = HostLink::new(&format!("http://127.0.0.1:{port}/api")).unwrap();
        assert!(link.probe(Duration::from_secs(1)).await);

        drop(listener);
        assert!(!link.probe(Duration::from_secs(1)).await);
        assert!(!link.is_connected());
        assert_eq!(link.local_address(), None);
    }
}
