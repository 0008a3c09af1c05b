//! Liveness tick.
//!
//! The periodic timer only raises a flag. All checking and reconnecting
//! happens when the control loop next takes the flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Flag shared between the timer task and the control loop.
#[derive(Debug, Clone, Default)]
pub struct TickFlag(Arc<AtomicBool>);

impl TickFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Raise `flag` every `period`, starting one period from now.
pub fn spawn_ticker(flag: TickFlag, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            flag.raise();
        }
    })
}
