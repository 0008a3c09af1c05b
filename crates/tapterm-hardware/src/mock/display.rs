//! Mock two-line display that records every frame it is asked to show.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{HardwareError, Result, traits::StatusDisplay};

/// Recording display.
///
/// # Examples
///
/// ```
/// use tapterm_hardware::mock::MockDisplay;
/// use tapterm_hardware::traits::StatusDisplay;
///
/// #[tokio::main]
/// async fn main() -> tapterm_hardware::Result<()> {
///     let (mut display, handle) = MockDisplay::new();
///     display.show("Payment mode", "Amount 5000").await?;
///
///     assert_eq!(
///         handle.last(),
///         Some(("Payment mode".to_string(), "Amount 5000".to_string()))
///     );
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    frames: Arc<Mutex<Vec<(String, String)>>>,
    detected: Arc<AtomicBool>,
}

impl MockDisplay {
    pub fn new() -> (Self, MockDisplayHandle) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let detected = Arc::new(AtomicBool::new(true));
        (
            Self {
                frames: frames.clone(),
                detected: detected.clone(),
            },
            MockDisplayHandle { frames, detected },
        )
    }
}

impl StatusDisplay for MockDisplay {
    async fn show(&mut self, line1: &str, line2: &str) -> Result<()> {
        if !self.detected.load(Ordering::SeqCst) {
            return Err(HardwareError::not_detected("display"));
        }
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((line1.to_string(), line2.to_string()));
        Ok(())
    }
}

/// Read access to the frames shown on a [`MockDisplay`].
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    frames: Arc<Mutex<Vec<(String, String)>>>,
    detected: Arc<AtomicBool>,
}

impl MockDisplayHandle {
    /// Unplug (`false`) or reattach the display. Writes to an unplugged
    /// display fail and are not recorded.
    pub fn set_detected(&self, detected: bool) {
        self.detected.store(detected, Ordering::SeqCst);
    }

    /// Every frame shown so far, oldest first.
    pub fn frames(&self) -> Vec<(String, String)> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<(String, String)> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Whether any frame's first line equals `line1`.
    pub fn has_shown(&self, line1: &str) -> bool {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(l1, _)| l1 == line1)
    }

    pub fn clear(&self) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
