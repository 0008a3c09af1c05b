//! Link availability tracking and reconnection.
//!
//! # State machine
//!
//! ```text
//! Connected ──check: link lost──> Disconnected ──reconnect──> Reconnecting
//!     ^                               ^                           │
//!     └──────────── restored ─────────┼───────────────────────────┤
//!                                     └────────── failed ─────────┘
//! ```
//!
//! The monitor is the only writer of connectivity state. Reconnection shares
//! the [`ProcessingLock`] with transactions so a network-stack reset never
//! interrupts a charge in flight.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tapterm_core::ProcessingLock;
use tapterm_hardware::{LinkDriver, Watchdog};
use tracing::{debug, info, warn};

use crate::gateway::LinkStatus;

/// Watchdog feed period while a reconnect attempt is pending.
const RECONNECT_FEED_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

impl LinkState {
    pub fn can_transition_to(&self, next: LinkState) -> bool {
        use LinkState::*;
        matches!(
            (self, next),
            (Connected, Disconnected)
                | (Disconnected, Connected)
                | (Disconnected, Reconnecting)
                | (Reconnecting, Connected)
                | (Reconnecting, Disconnected)
        )
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connected => write!(f, "connected"),
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Point-in-time view of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub connected: bool,
    pub last_checked_at: Option<Instant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The link came back; carries the local address if the driver has one.
    Restored { address: Option<String> },
    /// The attempt ended (error or `max_wait`) with the link still down.
    Failed,
    /// A transaction holds the processing lock; nothing was attempted.
    Refused,
}

/// Tracks link availability and drives reconnection.
#[derive(Debug)]
pub struct ConnectivityMonitor<L> {
    driver: L,
    state: LinkState,
    last_checked_at: Option<Instant>,
    reconnect_max_wait: Duration,
}

impl<L: LinkDriver> ConnectivityMonitor<L> {
    pub fn new(driver: L, reconnect_max_wait: Duration) -> Self {
        let state = if driver.is_connected() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        };
        Self {
            driver,
            state,
            last_checked_at: None,
            reconnect_max_wait,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn snapshot(&self) -> ConnectivityState {
        ConnectivityState {
            connected: self.is_available(),
            last_checked_at: self.last_checked_at,
        }
    }

    pub fn driver(&self) -> &L {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut L {
        &mut self.driver
    }

    /// Usable for backend calls right now.
    pub fn is_available(&self) -> bool {
        self.state == LinkState::Connected && self.driver.is_connected()
    }

    /// Periodic liveness check. Returns `true` when a reconnect is needed.
    pub fn check(&mut self, now: Instant) -> bool {
        self.last_checked_at = Some(now);

        if self.state == LinkState::Reconnecting {
            return false;
        }

        if self.driver.is_connected() {
            if self.state == LinkState::Disconnected {
                info!("Link came back on its own");
                self.transition(LinkState::Connected);
            }
            false
        } else {
            if self.state == LinkState::Connected {
                warn!("Link lost");
                self.transition(LinkState::Disconnected);
            }
            true
        }
    }

    /// Attempt to restore the link, waiting at most the configured maximum.
    ///
    /// Refused without side effects while `lock` is held. The watchdog is fed
    /// while the attempt is pending.
    pub async fn reconnect(
        &mut self,
        lock: &ProcessingLock,
        watchdog: &mut impl Watchdog,
    ) -> ReconnectOutcome {
        let Some(_guard) = lock.try_acquire() else {
            info!("Reconnect deferred, transaction in progress");
            return ReconnectOutcome::Refused;
        };

        self.transition(LinkState::Reconnecting);
        let max_wait = self.reconnect_max_wait;
        info!(max_wait_ms = max_wait.as_millis() as u64, "Reconnecting link");

        let attempt = {
            let reconnect = self.driver.reconnect(max_wait);
            let deadline = tokio::time::sleep(max_wait);
            let mut feed = tokio::time::interval(RECONNECT_FEED_INTERVAL);
            tokio::pin!(reconnect, deadline);

            loop {
                tokio::select! {
                    result = &mut reconnect => break result,
                    _ = &mut deadline => break Ok(false),
                    _ = feed.tick() => watchdog.feed(),
                }
            }
        };

        let up = match attempt {
            Ok(up) => up && self.driver.is_connected(),
            Err(e) => {
                warn!(error = %e, "Link driver refused reconnect");
                false
            }
        };

        if up {
            self.transition(LinkState::Connected);
            let address = self.driver.local_address();
            info!(address = ?address, "Link restored");
            ReconnectOutcome::Restored { address }
        } else {
            self.transition(LinkState::Disconnected);
            warn!("Reconnect failed");
            ReconnectOutcome::Failed
        }
    }

    fn transition(&mut self, next: LinkState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            debug!(from = %self.state, to = %next, "Unexpected link transition");
        }
        self.state = next;
    }
}

impl<L: LinkDriver> LinkStatus for ConnectivityMonitor<L> {
    fn is_available(&self) -> bool {
        ConnectivityMonitor::is_available(self)
    }
}
