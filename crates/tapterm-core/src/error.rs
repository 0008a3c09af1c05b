use thiserror::Error;

use crate::types::Capability;

/// Failure to complete an exchange with the backend.
///
/// Covers everything between "the link is down" and "the body could not be
/// decoded". All variants are recovered locally by the control loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("Link is not connected")]
    LinkDown,

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("Malformed response body: {message}")]
    MalformedBody { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },
}

impl ConnectivityError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedBody {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// Reasons a card is refused by the validation pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Card lookup failed: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Backend refused card lookup: {message}")]
    Backend { message: String },

    #[error("Card is blocked")]
    Blocked,

    #[error("User is not active")]
    UserInactive,

    #[error("User type '{user_type}' is not allowed on this terminal")]
    TypeNotAllowed { user_type: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Connectivity error: {0}")]
    Connectivity(#[from] ConnectivityError),

    // Session errors
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    // Card errors
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid card UID: {0}")]
    InvalidCardUid(String),

    // Transaction errors
    #[error("{operation} rejected by backend: {message}")]
    Transaction {
        operation: &'static str,
        message: String,
    },

    #[error("Capability not granted to this terminal: {capability}")]
    UnsupportedByTerminal { capability: Capability },

    #[error("Another transaction is in progress")]
    Busy,

    // Hardware errors
    #[error("Hardware error: {message}")]
    Hardware { message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl Error {
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    pub fn hardware(message: impl Into<String>) -> Self {
        Self::Hardware {
            message: message.into(),
        }
    }

    pub fn transaction(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transaction {
            operation,
            message: message.into(),
        }
    }

    /// Returns `true` for errors that end the process and trigger a restart.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Hardware { .. } | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
