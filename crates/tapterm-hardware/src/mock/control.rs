//! Mock control input and watchdog.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{
    Result,
    traits::{ControlInput, Watchdog},
};

/// Button whose raw level is set through a [`MockButtonHandle`].
#[derive(Debug)]
pub struct MockButton {
    level: Arc<AtomicBool>,
}

impl MockButton {
    pub fn new() -> (Self, MockButtonHandle) {
        let level = Arc::new(AtomicBool::new(false));
        (
            Self {
                level: level.clone(),
            },
            MockButtonHandle { level },
        )
    }
}

impl ControlInput for MockButton {
    fn is_pressed(&mut self) -> Result<bool> {
        Ok(self.level.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
pub struct MockButtonHandle {
    level: Arc<AtomicBool>,
}

impl MockButtonHandle {
    /// Set the raw level; bounces are simulated by calling this repeatedly.
    pub fn set_pressed(&self, pressed: bool) {
        self.level.store(pressed, Ordering::SeqCst);
    }
}

/// Watchdog that counts feeds.
#[derive(Debug)]
pub struct MockWatchdog {
    feeds: Arc<AtomicU64>,
}

impl MockWatchdog {
    pub fn new() -> (Self, MockWatchdogHandle) {
        let feeds = Arc::new(AtomicU64::new(0));
        (
            Self {
                feeds: feeds.clone(),
            },
            MockWatchdogHandle { feeds },
        )
    }
}

impl Watchdog for MockWatchdog {
    fn feed(&mut self) {
        self.feeds.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct MockWatchdogHandle {
    feeds: Arc<AtomicU64>,
}

impl MockWatchdogHandle {
    pub fn feed_count(&self) -> u64 {
        self.feeds.load(Ordering::SeqCst)
    }
}
