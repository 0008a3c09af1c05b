//! Hardware capability contracts.
//!
//! The control engine treats every peripheral as an external collaborator
//! with a narrow contract and no decision logic of its own. These traits are
//! that contract; the [`mock`](crate::mock) module provides in-memory
//! implementations for tests and the simulator.
//!
//! All I/O traits use native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). They are driven from one cooperative loop, so the returned futures
//! carry no `Send` bound and the traits are used through generics rather than
//! trait objects.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use crate::error::Result;
use crate::types::FirmwareVersion;

/// Contactless card reader.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use tapterm_hardware::traits::CardReader;
///
/// async fn wait_for_card<R: CardReader>(reader: &mut R) -> tapterm_hardware::Result<Vec<u8>> {
///     loop {
///         if let Some(uid) = reader.poll_card(Duration::from_millis(100)).await? {
///             return Ok(uid);
///         }
///     }
/// }
/// ```
pub trait CardReader {
    /// Query the reader firmware.
    ///
    /// Returns `Ok(None)` when nothing answered the probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus itself fails.
    async fn firmware_version(&mut self) -> Result<Option<FirmwareVersion>>;

    /// Wait up to `timeout` for a card and return its raw UID bytes.
    ///
    /// No card in the field is `Ok(None)`, not an error. The UID is returned
    /// unvalidated; length checks belong to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader stops responding.
    async fn poll_card(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;
}

/// Two-line character display.
pub trait StatusDisplay {
    /// Clear the screen and write both lines.
    ///
    /// Lines longer than the display are cut by the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the display does not acknowledge the write.
    async fn show(&mut self, line1: &str, line2: &str) -> Result<()>;
}

/// Single digital control input (the mode button).
pub trait ControlInput {
    /// Sample the raw, undebounced level. `true` means pressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read.
    fn is_pressed(&mut self) -> Result<bool>;
}

/// Network association of the device (Wi-Fi or similar).
pub trait LinkDriver {
    /// Current association state as reported by the network stack.
    fn is_connected(&self) -> bool;

    /// Restart association and wait at most `max_wait` for it to come up.
    ///
    /// Returns whether the link is connected when the call ends.
    ///
    /// # Errors
    ///
    /// Returns an error if the network stack refuses the request.
    async fn reconnect(&mut self, max_wait: Duration) -> Result<bool>;

    /// Address assigned on the local network, for operator display.
    fn local_address(&self) -> Option<String>;
}

/// Hardware liveness watchdog.
pub trait Watchdog {
    /// Signal that the control loop is still alive.
    fn feed(&mut self);
}
