//! Interval bookkeeping for the control loop.

use std::time::{Duration, Instant};

/// Fixed-interval schedule polled with an explicit clock.
#[derive(Debug, Clone)]
pub struct Schedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Schedule {
    /// Due on the first poll.
    pub fn immediate(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    /// First due one interval after `now`.
    pub fn after(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_due: Some(now + interval),
        }
    }

    /// Whether the schedule fired at `now`. Firing re-arms it one interval
    /// later; missed intervals are not replayed.
    pub fn due(&mut self, now: Instant) -> bool {
        if self.next_due.is_some_and(|due| now < due) {
            return false;
        }
        self.next_due = Some(now + self.interval);
        true
    }

    /// Push the next firing to one interval after `now`.
    pub fn reset(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
