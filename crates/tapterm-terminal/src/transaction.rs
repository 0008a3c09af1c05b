//! Mode-specific execution for a validated card.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──acquire lock──> Locked ──> Executing ──> Idle
//!   └── lock held ──> Busy (nothing executed)
//! ```
//!
//! The [`ProcessingLock`] guard lives for the whole invocation, so every
//! return path releases it. Capability and link checks run before any
//! backend call.

use std::time::Duration;

use tapterm_core::{
    CardRecord, CardUid, ConnectivityError, Error, OperationMode, ProcessingLock,
};
use tapterm_network::{BackendClient, BackendError, HttpTransport, LinkStatus};
use tracing::{info, warn};

use crate::presenter::{DisplayMessage, Intent, Presenter};
use crate::session::TerminalSession;

/// What happened, and the last thing the operator was shown.
#[derive(Debug)]
pub struct TransactionResult {
    pub success: bool,
    pub message: DisplayMessage,
    pub error: Option<Error>,
}

impl TransactionResult {
    fn ok(last: &Intent) -> Self {
        Self {
            success: true,
            message: last.render(),
            error: None,
        }
    }

    fn failed(last: &Intent, error: Error) -> Self {
        Self {
            success: false,
            message: last.render(),
            error: Some(error),
        }
    }
}

/// A validated card on its way to execution.
#[derive(Debug, Clone, Copy)]
pub struct Transaction<'a> {
    pub uid: &'a CardUid,
    pub record: &'a CardRecord,
    pub mode: OperationMode,
}

#[derive(Debug, Clone)]
pub struct TransactionProcessor {
    amount: f64,
    display_dwell: Duration,
}

impl TransactionProcessor {
    pub fn new(amount: f64, display_dwell: Duration) -> Self {
        Self {
            amount,
            display_dwell,
        }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Run one transaction.
    ///
    /// Refused with `Error::Busy` when the lock is already held. The lock is
    /// free again when this returns.
    pub async fn execute<T: HttpTransport, P: Presenter>(
        &self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        session: &TerminalSession,
        lock: &ProcessingLock,
        presenter: &mut P,
        tx: Transaction<'_>,
    ) -> TransactionResult {
        let Some(_guard) = lock.try_acquire() else {
            warn!(uid = %tx.uid, "Transaction refused, another is in progress");
            let shown = self.show(presenter, Intent::Busy).await;
            return TransactionResult::failed(&shown, Error::Busy);
        };

        if !link.is_available() {
            let shown = self.show(presenter, Intent::NoConnection).await;
            return TransactionResult::failed(&shown, ConnectivityError::LinkDown.into());
        }

        let capability = tx.mode.required_capability();
        if !session.supports(capability) {
            info!(%capability, mode = %tx.mode, "Mode not granted to this terminal");
            let shown = self.show(presenter, Intent::Unsupported(tx.mode)).await;
            return TransactionResult::failed(&shown, Error::UnsupportedByTerminal { capability });
        }

        match tx.mode {
            OperationMode::Payment => self.pay(backend, link, presenter, tx.uid).await,
            OperationMode::Access => self.grant_access(backend, link, presenter, tx).await,
        }
    }

    async fn pay<T: HttpTransport, P: Presenter>(
        &self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        presenter: &mut P,
        uid: &CardUid,
    ) -> TransactionResult {
        presenter.present(&Intent::ProcessingPayment).await;

        if let Err(e) = backend.process_payment(link, uid, self.amount).await {
            warn!(%uid, amount = self.amount, error = %e, "Payment failed");
            let shown = self.show(presenter, Intent::PaymentFailed).await;
            return TransactionResult::failed(&shown, into_error("payment", e));
        }

        info!(%uid, amount = self.amount, "Payment accepted");
        let mut shown = self
            .show(presenter, Intent::PaymentSuccess { amount: self.amount })
            .await;

        // Fresh lookup; the pre-payment balance is stale by now.
        match backend.card_info(link, uid).await {
            Ok(record) => {
                shown = self.show(presenter, Intent::CardBalance { record }).await;
            }
            Err(e) => warn!(%uid, error = %e, "Balance re-query failed"),
        }
        TransactionResult::ok(&shown)
    }

    async fn grant_access<T: HttpTransport, P: Presenter>(
        &self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        presenter: &mut P,
        tx: Transaction<'_>,
    ) -> TransactionResult {
        presenter.present(&Intent::VerifyingAccess).await;

        if let Err(e) = backend.verify_access(link, tx.uid).await {
            warn!(uid = %tx.uid, error = %e, "Access denied");
            let shown = self.show(presenter, Intent::AccessDenied).await;
            return TransactionResult::failed(&shown, into_error("access verification", e));
        }

        info!(uid = %tx.uid, user_type = %tx.record.user_type, "Access granted");
        self.show(presenter, Intent::AccessGranted).await;

        // Best effort: the grant above stands either way.
        if let Err(e) = backend.record_access(link, tx.uid).await {
            warn!(uid = %tx.uid, error = %e, "Access granted but not recorded");
        }

        let shown = self
            .show(
                presenter,
                Intent::AccessUser {
                    record: tx.record.clone(),
                },
            )
            .await;
        TransactionResult::ok(&shown)
    }

    /// Present `intent` and hold it for the display dwell.
    async fn show<P: Presenter>(&self, presenter: &mut P, intent: Intent) -> Intent {
        presenter.present(&intent).await;
        tokio::time::sleep(self.display_dwell).await;
        intent
    }
}

fn into_error(operation: &'static str, e: BackendError) -> Error {
    match e {
        BackendError::Connectivity(e) => Error::Connectivity(e),
        rejected @ BackendError::Rejected { .. } => {
            Error::transaction(operation, rejected.reason())
        }
    }
}
