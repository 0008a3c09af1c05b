//! Hardware capability contracts for the terminal control engine.
//!
//! The card reader, the two-line display, the mode button, the network link
//! and the watchdog are external collaborators. This crate defines the narrow
//! contracts the engine relies on and in-memory mocks for each of them.
//!
//! # Device Traits
//!
//! - [`CardReader`]: firmware probe and UID polling
//! - [`StatusDisplay`]: two-line text output
//! - [`ControlInput`]: raw level of the mode button
//! - [`LinkDriver`]: network association state and reconnection
//! - [`Watchdog`]: liveness signal
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tapterm_hardware::traits::{CardReader, StatusDisplay};
//!
//! async fn show_next_card<R: CardReader, D: StatusDisplay>(
//!     reader: &mut R,
//!     display: &mut D,
//! ) -> tapterm_hardware::Result<()> {
//!     if let Some(uid) = reader.poll_card(Duration::from_millis(100)).await? {
//!         display.show("Card detected", &format!("{} bytes", uid.len())).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with [`HardwareError`].
//!
//! [`CardReader`]: traits::CardReader
//! [`StatusDisplay`]: traits::StatusDisplay
//! [`ControlInput`]: traits::ControlInput
//! [`LinkDriver`]: traits::LinkDriver
//! [`Watchdog`]: traits::Watchdog

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{CardReader, ControlInput, LinkDriver, StatusDisplay, Watchdog};
pub use types::FirmwareVersion;
