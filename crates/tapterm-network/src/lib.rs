//! Backend access and link management for the terminal.
//!
//! # Components
//!
//! - [`HttpTransport`]: byte-level request execution, with [`ReqwestTransport`]
//!   for production
//! - [`RequestGateway`]: credentials, timeout and link fail-fast for every call
//! - [`BackendClient`]: the five typed terminal operations
//! - [`ConnectivityMonitor`]: link state machine and bounded reconnection
//! - [`mock::ScriptedTransport`]: in-memory transport for tests
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tapterm_core::{CardUid, DeviceId, TerminalId};
//! use tapterm_network::{BackendClient, ReqwestTransport, RequestGateway};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new(Duration::from_secs(3))?;
//! let gateway = RequestGateway::new(
//!     transport,
//!     "http://backend.local/api",
//!     "token",
//!     DeviceId::new("esp-01")?,
//!     Duration::from_secs(8),
//! );
//! let backend = BackendClient::new(gateway, TerminalId::new("T-01")?);
//!
//! let link_up = true;
//! let grant = backend.authenticate(&link_up).await?;
//! let record = backend.card_info(&link_up, &CardUid::parse("04A1B2C3")?).await?;
//! println!("{grant:?} {record:?}");
//! # Ok(())
//! # }
//! ```

mod backend;
mod connectivity;
mod gateway;
pub mod mock;
mod transport;

pub use backend::{AuthGrant, BackendClient, BackendError};
pub use connectivity::{ConnectivityMonitor, ConnectivityState, LinkState, ReconnectOutcome};
pub use gateway::{LinkStatus, RequestGateway};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, ReqwestTransport};
