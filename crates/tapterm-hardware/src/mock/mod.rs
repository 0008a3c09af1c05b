//! Mock device implementations for testing and development.
//!
//! Each mock comes with a handle that drives or inspects it from the outside,
//! so tests and the simulator can run the engine without physical hardware.

pub mod control;
pub mod display;
pub mod link;
pub mod reader;

pub use control::{MockButton, MockButtonHandle, MockWatchdog, MockWatchdogHandle};
pub use display::{MockDisplay, MockDisplayHandle};
pub use link::{MockLink, MockLinkHandle};
pub use reader::{MockCardReader, MockCardReaderHandle};
