//! Read-only status snapshot.

use serde::Serialize;
use tapterm_core::{Capability, OperationMode};
use tapterm_network::LinkState;

/// What a local status endpoint would report. Building one changes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub link_connected: bool,
    pub link_state: LinkState,
    pub mode: OperationMode,
    pub payment_amount: f64,
    pub terminal_active: bool,
    pub supports_payment: bool,
    pub supports_topup: bool,
    pub supports_transfer: bool,
    pub supports_access: bool,
    pub allowed_user_types: Vec<String>,
}

impl StatusSnapshot {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Payment => self.supports_payment,
            Capability::Topup => self.supports_topup,
            Capability::Transfer => self.supports_transfer,
            Capability::Access => self.supports_access,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
