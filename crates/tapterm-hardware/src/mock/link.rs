//! Mock network link.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::{Result, traits::LinkDriver};

/// Link whose association state and reconnect outcome are scripted through
/// a [`MockLinkHandle`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tapterm_hardware::mock::MockLink;
/// use tapterm_hardware::traits::LinkDriver;
///
/// #[tokio::main]
/// async fn main() -> tapterm_hardware::Result<()> {
///     let (mut link, handle) = MockLink::new(false);
///     handle.set_reconnect_succeeds(true);
///
///     assert!(!link.is_connected());
///     assert!(link.reconnect(Duration::from_secs(1)).await?);
///     assert!(link.is_connected());
///     assert_eq!(handle.reconnect_attempts(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockLink {
    state: Arc<LinkState>,
}

#[derive(Debug)]
struct LinkState {
    connected: AtomicBool,
    reconnect_succeeds: AtomicBool,
    attempts: AtomicU32,
}

impl MockLink {
    pub fn new(connected: bool) -> (Self, MockLinkHandle) {
        let state = Arc::new(LinkState {
            connected: AtomicBool::new(connected),
            reconnect_succeeds: AtomicBool::new(true),
            attempts: AtomicU32::new(0),
        });
        (
            Self {
                state: state.clone(),
            },
            MockLinkHandle { state },
        )
    }
}

impl LinkDriver for MockLink {
    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    async fn reconnect(&mut self, _max_wait: Duration) -> Result<bool> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.reconnect_succeeds.load(Ordering::SeqCst) {
            self.state.connected.store(true, Ordering::SeqCst);
        }
        Ok(self.is_connected())
    }

    fn local_address(&self) -> Option<String> {
        self.is_connected().then(|| "192.168.4.2".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<LinkState>,
}

impl MockLinkHandle {
    /// Simulate the network stack gaining or losing association.
    pub fn set_connected(&self, connected: bool) {
        self.state.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_reconnect_succeeds(&self, succeeds: bool) {
        self.state.reconnect_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state.attempts.load(Ordering::SeqCst)
    }
}
