//! Debounced mode toggle.

use std::time::{Duration, Instant};

use tapterm_core::{OperationMode, ProcessingLock};
use tracing::info;

/// Turns raw button samples into Payment/Access toggles.
///
/// A level must hold for the debounce interval before it counts as stable;
/// each stable rising edge toggles the mode once. State starts fresh on
/// every boot.
#[derive(Debug, Clone)]
pub struct ModeController {
    debounce: Duration,
    last_raw: bool,
    last_change_at: Option<Instant>,
    stable: bool,
}

impl ModeController {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            last_raw: false,
            last_change_at: None,
            stable: false,
        }
    }

    /// Feed one raw sample. Returns `true` on a stable rising edge.
    pub fn sample(&mut self, raw: bool, now: Instant) -> bool {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_change_at = Some(now);
        }

        let settled = self
            .last_change_at
            .is_none_or(|changed| now.saturating_duration_since(changed) >= self.debounce);

        if settled && raw != self.stable {
            self.stable = raw;
            return raw;
        }
        false
    }

    /// Feed one raw sample and apply any resulting toggle to `mode`.
    ///
    /// An edge seen while `lock` is held is consumed without toggling, so
    /// the mode never changes under a running transaction. Returns whether
    /// `mode` changed.
    pub fn poll(
        &mut self,
        raw: bool,
        now: Instant,
        mode: &mut OperationMode,
        lock: &ProcessingLock,
    ) -> bool {
        if !self.sample(raw, now) {
            return false;
        }
        if lock.is_held() {
            info!(mode = %mode, "Mode toggle ignored, transaction in progress");
            return false;
        }

        *mode = mode.toggled();
        info!(mode = %mode, "Mode changed");
        true
    }
}
