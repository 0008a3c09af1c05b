pub mod config;
pub mod constants;
pub mod error;
pub mod lock;
pub mod types;

pub use config::TerminalConfig;
pub use error::{ConnectivityError, Error, Result, ValidationError};
pub use lock::{ProcessingGuard, ProcessingLock};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
