//! Reader event gate: UID normalization and dedupe.
//!
//! A card resting on the reader is seen on every poll. The gate lets the
//! first read of each card through and suppresses that card until the dedupe
//! window has passed since its accepted read, whatever other cards were
//! tapped in between.

use std::time::{Duration, Instant};

use tapterm_core::CardUid;
use tapterm_core::constants::MAX_TRACKED_CARDS;
use tracing::{debug, trace};

/// A read that passed the gate, valid for one trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardReadEvent {
    pub uid: CardUid,
    pub observed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct CardGate {
    dedupe_window: Duration,
    capacity: usize,
    accepted: Vec<(CardUid, Instant)>,
}

impl CardGate {
    pub fn new(dedupe_window: Duration) -> Self {
        Self::with_capacity(dedupe_window, MAX_TRACKED_CARDS)
    }

    /// Gate remembering at most `capacity` cards inside the window.
    pub fn with_capacity(dedupe_window: Duration, capacity: usize) -> Self {
        Self {
            dedupe_window,
            capacity: capacity.max(1),
            accepted: Vec::new(),
        }
    }

    /// Admit a raw reader UID, returning the event to process.
    ///
    /// `None` for malformed UIDs (empty or longer than supported) and for a
    /// UID accepted less than the dedupe window ago. An accepted read
    /// restarts that card's window.
    pub fn admit(&mut self, raw_uid: &[u8], now: Instant) -> Option<CardReadEvent> {
        let uid = match CardUid::from_bytes(raw_uid) {
            Ok(uid) => uid,
            Err(e) => {
                debug!(len = raw_uid.len(), error = %e, "Malformed UID dropped");
                return None;
            }
        };

        self.purge_expired(now);

        if self.accepted.iter().any(|(seen, _)| *seen == uid) {
            trace!(%uid, "Repeat read suppressed");
            return None;
        }

        if self.accepted.len() >= self.capacity {
            self.drop_oldest();
        }
        self.accepted.push((uid.clone(), now));
        Some(CardReadEvent {
            uid,
            observed_at: now,
        })
    }

    /// Boolean form of [`admit`](Self::admit).
    pub fn accept(&mut self, raw_uid: &[u8], now: Instant) -> bool {
        self.admit(raw_uid, now).is_some()
    }

    pub fn dedupe_window(&self) -> Duration {
        self.dedupe_window
    }

    /// Cards currently inside their dedupe window.
    pub fn tracked(&self) -> usize {
        self.accepted.len()
    }

    fn purge_expired(&mut self, now: Instant) {
        let window = self.dedupe_window;
        self.accepted
            .retain(|(_, at)| now.saturating_duration_since(*at) < window);
    }

    fn drop_oldest(&mut self) {
        if let Some((idx, _)) = self
            .accepted
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, at))| *at)
        {
            let (uid, _) = self.accepted.swap_remove(idx);
            debug!(%uid, "Dedupe table full, oldest card evicted");
        }
    }
}
