//! Presentation intents and the two-line display presenter.
//!
//! Every component reports what the operator should see as an [`Intent`].
//! Text is produced only here, in [`Intent::render`], and fitted to the
//! display by [`DisplayPresenter`].

#![allow(async_fn_in_trait)]

use tapterm_core::constants::DISPLAY_COLUMNS;
use tapterm_core::{CardRecord, CardUid, ConnectivityError, OperationMode, ValidationError};
use tapterm_hardware::{FirmwareVersion, HardwareError, StatusDisplay};
use tracing::{trace, warn};

/// UID characters shown on the "card detected" screen.
const UID_PREVIEW_CHARS: usize = 10;

/// Two lines of display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub line1: String,
    pub line2: String,
}

impl DisplayMessage {
    pub fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.into(),
        }
    }
}

/// Something the operator should be told.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Boot,
    DisplayMissing,
    ReaderProbe,
    ReaderOk { version: FirmwareVersion },
    ReaderMissing,
    Authenticating,
    TerminalActive,
    AuthFailed,
    Restarting,
    Idle {
        mode: OperationMode,
        supported: bool,
        amount: f64,
    },
    CardDetected { uid: CardUid },
    TerminalInactive,
    Denied(ValidationError),
    Unsupported(OperationMode),
    Busy,
    ProcessingPayment,
    PaymentSuccess { amount: f64 },
    CardBalance { record: CardRecord },
    PaymentFailed,
    VerifyingAccess,
    AccessGranted,
    AccessUser { record: CardRecord },
    AccessDenied,
    NoConnection,
    LinkLost,
    LinkRestored { address: Option<String> },
    LinkFailed,
}

impl Intent {
    /// Display text for this intent, before fitting to the screen.
    pub fn render(&self) -> DisplayMessage {
        use Intent::*;
        match self {
            Boot => DisplayMessage::new("Tap terminal", "Starting..."),
            DisplayMissing => DisplayMessage::new("Display error", "Not detected"),
            ReaderProbe => DisplayMessage::new("Card reader", "Initializing..."),
            ReaderOk { version } => DisplayMessage::new("Reader OK", format!("Version {version}")),
            ReaderMissing => DisplayMessage::new("Reader error", "Not detected"),
            Authenticating => DisplayMessage::new("Authenticating", "Terminal..."),
            TerminalActive => DisplayMessage::new("Terminal active", "Tap card"),
            AuthFailed => DisplayMessage::new("Auth failed", "Restart system"),
            Restarting => DisplayMessage::new("System reset", "Restarting..."),
            Idle {
                mode,
                supported,
                amount,
            } => match (mode, supported) {
                (OperationMode::Payment, true) => {
                    DisplayMessage::new("Payment mode", format!("Amount {}", format_amount(*amount)))
                }
                (OperationMode::Payment, false) => {
                    DisplayMessage::new("Payment mode", "Not supported")
                }
                (OperationMode::Access, true) => DisplayMessage::new("Access mode", "Tap card"),
                (OperationMode::Access, false) => DisplayMessage::new("Access mode", "Not supported"),
            },
            CardDetected { uid } => DisplayMessage::new(
                "Card detected",
                format!("{}...", uid.short(UID_PREVIEW_CHARS)),
            ),
            TerminalInactive => DisplayMessage::new("Terminal", "Inactive"),
            Denied(reason) => render_denial(reason),
            Unsupported(OperationMode::Payment) => {
                DisplayMessage::new("Not supported", "Payment disabled")
            }
            Unsupported(OperationMode::Access) => {
                DisplayMessage::new("Not supported", "Access disabled")
            }
            Busy => DisplayMessage::new("Busy", "Please wait"),
            ProcessingPayment => DisplayMessage::new("Processing", "Payment..."),
            PaymentSuccess { amount } => DisplayMessage::new(
                "Payment success",
                format!("Amount {}", format_amount(*amount)),
            ),
            CardBalance { record } => DisplayMessage::new(
                record.user_name.as_str(),
                if record.is_blocked {
                    "[BLOCKED]".to_string()
                } else {
                    format!("Balance {}", format_amount(record.balance))
                },
            ),
            PaymentFailed => DisplayMessage::new("Payment failed", "Try again"),
            VerifyingAccess => DisplayMessage::new("Verifying", "Access..."),
            AccessGranted => DisplayMessage::new("Access granted", "Please enter"),
            AccessUser { record } => DisplayMessage::new(
                "User:",
                if record.is_blocked {
                    format!("{} [BLOCKED]", record.user_name)
                } else {
                    record.user_name.clone()
                },
            ),
            AccessDenied => DisplayMessage::new("Access denied", "Contact admin"),
            NoConnection => DisplayMessage::new("No connection", "Try again later"),
            LinkLost => DisplayMessage::new("Link lost", "Reconnecting..."),
            LinkRestored { address } => {
                DisplayMessage::new("Link connected", address.clone().unwrap_or_default())
            }
            LinkFailed => DisplayMessage::new("Link failed", "Try again later"),
        }
    }
}

fn render_denial(reason: &ValidationError) -> DisplayMessage {
    match reason {
        ValidationError::Blocked => DisplayMessage::new("Card blocked", "Contact admin"),
        ValidationError::UserInactive => DisplayMessage::new("User inactive", "Access denied"),
        ValidationError::TypeNotAllowed { .. } => {
            DisplayMessage::new("Access rights", "Not allowed")
        }
        ValidationError::Backend { .. } => DisplayMessage::new("Card rejected", "Contact admin"),
        ValidationError::Connectivity(ConnectivityError::LinkDown) => {
            DisplayMessage::new("No connection", "Try again later")
        }
        ValidationError::Connectivity(_) => DisplayMessage::new("Card check", "failed, retry"),
    }
}

/// Whole amounts without decimals, anything else with two.
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

/// Sink for presentation intents.
pub trait Presenter {
    /// Show `intent`. Presentation failures are the presenter's concern and
    /// never abort the caller.
    async fn present(&mut self, intent: &Intent);

    /// Show `intent` and report whether the output device took it.
    ///
    /// Used once at startup to confirm the display is there.
    ///
    /// # Errors
    ///
    /// The device error when the write was not acknowledged.
    async fn present_checked(&mut self, intent: &Intent) -> Result<(), HardwareError>;
}

/// Presenter that renders onto a two-line [`StatusDisplay`].
#[derive(Debug)]
pub struct DisplayPresenter<D> {
    display: D,
    columns: usize,
}

impl<D: StatusDisplay> DisplayPresenter<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            columns: DISPLAY_COLUMNS,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn fit(&self, line: &str) -> String {
        line.chars().take(self.columns).collect()
    }
}

impl<D: StatusDisplay> Presenter for DisplayPresenter<D> {
    async fn present(&mut self, intent: &Intent) {
        if let Err(e) = self.present_checked(intent).await {
            warn!(error = %e, "Display write failed");
        }
    }

    async fn present_checked(&mut self, intent: &Intent) -> Result<(), HardwareError> {
        let message = intent.render();
        let line1 = self.fit(&message.line1);
        let line2 = self.fit(&message.line2);
        trace!(%line1, %line2, "Display");
        self.display.show(&line1, &line2).await
    }
}
