//! Terminal control engine.
//!
//! Wires the session, card gate, validation pipeline, transaction processor
//! and mode controller into the cooperative loop run by [`Terminal`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tapterm_core::TerminalConfig;
//! use tapterm_hardware::mock::{MockButton, MockCardReader, MockDisplay, MockLink, MockWatchdog};
//! use tapterm_network::{BackendClient, RequestGateway, ReqwestTransport};
//! use tapterm_terminal::{DisplayPresenter, Peripherals, Terminal};
//!
//! # async fn example(config: TerminalConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = RequestGateway::new(
//!     ReqwestTransport::new(Duration::from_secs(3))?,
//!     &config.backend.base_url,
//!     config.backend.api_token.clone(),
//!     config.identity.device_id()?,
//!     config.backend.request_timeout(),
//! );
//! let backend = BackendClient::new(gateway, config.identity.terminal_id()?);
//!
//! let (reader, _cards) = MockCardReader::new();
//! let (button, _button) = MockButton::new();
//! let (watchdog, _) = MockWatchdog::new();
//! let (link, _) = MockLink::new(true);
//! let (display, _) = MockDisplay::new();
//!
//! let peripherals = Peripherals {
//!     reader,
//!     button,
//!     watchdog,
//!     link,
//!     presenter: DisplayPresenter::new(display),
//! };
//! let mut terminal = Terminal::new(&config, peripherals, backend);
//! terminal.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod card_gate;
pub mod engine;
pub mod mode;
pub mod presenter;
pub mod schedule;
pub mod session;
pub mod status;
pub mod ticker;
pub mod transaction;
pub mod validation;

pub use card_gate::{CardGate, CardReadEvent};
pub use engine::{Peripherals, Terminal};
pub use mode::ModeController;
pub use presenter::{DisplayMessage, DisplayPresenter, Intent, Presenter};
pub use schedule::Schedule;
pub use session::TerminalSession;
pub use status::StatusSnapshot;
pub use ticker::{TickFlag, spawn_ticker};
pub use transaction::{Transaction, TransactionProcessor, TransactionResult};
pub use validation::CardValidator;
