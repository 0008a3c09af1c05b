//! Typed client for the terminal REST surface.
//!
//! Each operation builds its JSON body, sends it through the
//! [`RequestGateway`] and decodes the `{ success, data, message }` envelope.
//! A received `success = false` is reported as [`BackendError::Rejected`],
//! separate from transport and decoding failures.

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tapterm_core::constants::{
    PATH_AUTHENTICATE, PATH_CARD_INFO, PATH_PROCESS_PAYMENT, PATH_RECORD_ACCESS,
    PATH_VERIFY_ACCESS,
};
use tapterm_core::{
    AllowedUserTypes, Capability, CapabilitySet, CardRecord, CardUid, ConnectivityError,
    DeviceId, TerminalId,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gateway::{LinkStatus, RequestGateway};
use crate::transport::{HttpResponse, HttpTransport, Method};

/// Placeholder origin for building relative endpoints; only path and query
/// are kept.
const QUERY_BASE: &str = "http://backend.invalid/";

/// Failure of a typed backend operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// The backend answered and said no.
    #[error("{operation} rejected: {}", .message.as_deref().unwrap_or("no reason given"))]
    Rejected {
        operation: &'static str,
        message: Option<String>,
    },
}

impl BackendError {
    /// Operator-facing reason, if the backend supplied one.
    pub fn reason(&self) -> String {
        match self {
            BackendError::Connectivity(e) => e.to_string(),
            BackendError::Rejected { message, .. } => message
                .clone()
                .unwrap_or_else(|| "rejected".to_string()),
        }
    }
}

/// Result of a successful terminal authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub capabilities: CapabilitySet,
    pub allowed_user_types: AllowedUserTypes,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: Flag,
    data: Option<T>,
    message: Option<String>,
}

/// Boolean that also accepts `0`/`1` and `"true"`/`"false"`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(from = "FlagRepr")]
struct Flag(bool);

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<FlagRepr> for Flag {
    fn from(repr: FlagRepr) -> Self {
        Flag(match repr {
            FlagRepr::Bool(b) => b,
            FlagRepr::Int(n) => n != 0,
            FlagRepr::Text(s) => matches!(s.trim(), "true" | "1"),
        })
    }
}

/// Number that may arrive as a JSON number or a numeric string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    fn value(&self) -> Option<f64> {
        match self {
            Amount::Number(n) => Some(*n),
            Amount::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct AuthData {
    terminal: Option<TerminalGrant>,
}

#[derive(Deserialize)]
struct TerminalGrant {
    #[serde(default)]
    supports_payment: Flag,
    #[serde(default)]
    supports_topup: Flag,
    #[serde(default)]
    supports_transfer: Flag,
    #[serde(default)]
    supports_access: Flag,
    #[serde(default)]
    is_active: Flag,
    #[serde(default)]
    allowed_user_types: Vec<String>,
}

#[derive(Deserialize)]
struct CardInfoData {
    user: Option<UserFacts>,
    card: Option<CardFacts>,
}

#[derive(Deserialize)]
struct UserFacts {
    #[serde(default)]
    name: Option<String>,
    role_type: Option<String>,
    status: Option<String>,
}

#[derive(Deserialize)]
struct CardFacts {
    balance: Option<Amount>,
    is_blocked: Option<Flag>,
}

/// Client for the five terminal operations.
#[derive(Debug)]
pub struct BackendClient<T> {
    gateway: RequestGateway<T>,
    terminal_id: TerminalId,
}

impl<T: HttpTransport> BackendClient<T> {
    pub fn new(gateway: RequestGateway<T>, terminal_id: TerminalId) -> Self {
        Self {
            gateway,
            terminal_id,
        }
    }

    pub fn gateway(&self) -> &RequestGateway<T> {
        &self.gateway
    }

    pub fn terminal_id(&self) -> &TerminalId {
        &self.terminal_id
    }

    fn device_id(&self) -> &DeviceId {
        self.gateway.device_id()
    }

    /// Authenticate this terminal and fetch its capability grant.
    ///
    /// # Errors
    ///
    /// `BackendError::Connectivity` for transport, status or decoding
    /// failures, including a success envelope without `data.terminal`;
    /// `BackendError::Rejected` for `success = false`.
    pub async fn authenticate(&self, link: &impl LinkStatus) -> Result<AuthGrant, BackendError> {
        let body = json!({
            "terminal_id": self.terminal_id.as_str(),
            "device_id": self.device_id().as_str(),
        });
        let response = self
            .gateway
            .send(link, PATH_AUTHENTICATE, Method::Post, Some(body.to_string()))
            .await?;

        let data: AuthData = decode("authenticate", &response)?;
        let terminal = data
            .terminal
            .ok_or_else(|| ConnectivityError::malformed("missing data.terminal"))?;

        let capabilities = [
            (terminal.supports_payment, Capability::Payment),
            (terminal.supports_topup, Capability::Topup),
            (terminal.supports_transfer, Capability::Transfer),
            (terminal.supports_access, Capability::Access),
        ]
        .into_iter()
        .filter_map(|(flag, capability)| flag.0.then_some(capability))
        .collect();

        let grant = AuthGrant {
            capabilities,
            allowed_user_types: AllowedUserTypes::truncating(terminal.allowed_user_types),
            is_active: terminal.is_active.0,
        };
        info!(
            is_active = grant.is_active,
            capabilities = ?grant.capabilities.iter().collect::<Vec<_>>(),
            allowed_user_types = ?grant.allowed_user_types.as_slice(),
            "Terminal authenticated"
        );
        Ok(grant)
    }

    /// Look up card and user facts.
    ///
    /// A missing `is_blocked` is read as blocked and a user without
    /// `status = "active"` as inactive.
    ///
    /// # Errors
    ///
    /// As for [`authenticate`](Self::authenticate); a success envelope
    /// without `data.user`, `data.card`, the role or the balance is malformed.
    pub async fn card_info(
        &self,
        link: &impl LinkStatus,
        uid: &CardUid,
    ) -> Result<CardRecord, BackendError> {
        let endpoint = with_query(
            PATH_CARD_INFO,
            &[
                ("card_uid", uid.as_str()),
                ("terminal_id", self.terminal_id.as_str()),
            ],
        )?;
        let response = self.gateway.send(link, &endpoint, Method::Get, None).await?;

        let data: CardInfoData = decode("card lookup", &response)?;
        let user = data
            .user
            .ok_or_else(|| ConnectivityError::malformed("missing data.user"))?;
        let card = data
            .card
            .ok_or_else(|| ConnectivityError::malformed("missing data.card"))?;

        let user_type = user
            .role_type
            .ok_or_else(|| ConnectivityError::malformed("missing data.user.role_type"))?;
        let balance = card
            .balance
            .as_ref()
            .and_then(Amount::value)
            .ok_or_else(|| ConnectivityError::malformed("missing or invalid data.card.balance"))?;

        let record = CardRecord {
            user_name: user.name.unwrap_or_default(),
            user_type,
            balance,
            is_blocked: card.is_blocked.is_none_or(|flag| flag.0),
            is_user_active: user.status.as_deref() == Some("active"),
        };
        debug!(%uid, user_type = %record.user_type, blocked = record.is_blocked, active = record.is_user_active, "Card resolved");
        Ok(record)
    }

    /// Charge `amount` to the card.
    ///
    /// # Errors
    ///
    /// `BackendError::Rejected` when the backend declines the payment.
    pub async fn process_payment(
        &self,
        link: &impl LinkStatus,
        uid: &CardUid,
        amount: f64,
    ) -> Result<(), BackendError> {
        let body = json!({
            "terminal_id": self.terminal_id.as_str(),
            "card_uid": uid.as_str(),
            "amount": amount,
            "notes": format!("Payment at terminal {}", self.terminal_id),
            "transaction_time": chrono::Utc::now().timestamp_millis(),
        });
        self.post_for_success("payment", link, PATH_PROCESS_PAYMENT, body)
            .await
    }

    /// Ask the backend whether the card may pass.
    ///
    /// # Errors
    ///
    /// `BackendError::Rejected` when access is denied.
    pub async fn verify_access(
        &self,
        link: &impl LinkStatus,
        uid: &CardUid,
    ) -> Result<(), BackendError> {
        let body = json!({
            "terminal_id": self.terminal_id.as_str(),
            "card_uid": uid.as_str(),
            "device_id": self.device_id().as_str(),
        });
        self.post_for_success("access verification", link, PATH_VERIFY_ACCESS, body)
            .await
    }

    /// Log an access event.
    ///
    /// # Errors
    ///
    /// `BackendError::Rejected` when the backend refuses the record.
    pub async fn record_access(
        &self,
        link: &impl LinkStatus,
        uid: &CardUid,
    ) -> Result<(), BackendError> {
        let body = json!({
            "terminal_id": self.terminal_id.as_str(),
            "card_uid": uid.as_str(),
            "notes": format!("Access at terminal {}", self.terminal_id),
            "timestamp": chrono::Utc::now().timestamp_millis(),
            "device_id": self.device_id().as_str(),
        });
        self.post_for_success("access record", link, PATH_RECORD_ACCESS, body)
            .await
    }

    async fn post_for_success(
        &self,
        operation: &'static str,
        link: &impl LinkStatus,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), BackendError> {
        let response = self
            .gateway
            .send(link, path, Method::Post, Some(body.to_string()))
            .await?;
        decode_envelope::<serde_json::Value>(operation, &response)?;
        Ok(())
    }
}

/// Decode a success envelope and require its `data`.
fn decode<D: DeserializeOwned>(
    operation: &'static str,
    response: &HttpResponse,
) -> Result<D, BackendError> {
    decode_envelope(operation, response)?
        .ok_or_else(|| ConnectivityError::malformed(format!("{operation}: missing data")).into())
}

fn decode_envelope<D: DeserializeOwned>(
    operation: &'static str,
    response: &HttpResponse,
) -> Result<Option<D>, BackendError> {
    if !response.is_success() {
        return Err(ConnectivityError::Status {
            status: response.status,
        }
        .into());
    }

    let envelope: Envelope<D> = serde_json::from_str(&response.body)
        .map_err(|e| ConnectivityError::malformed(format!("{operation}: {e}")))?;

    if !envelope.success.0 {
        warn!(operation, message = ?envelope.message, "Backend rejected request");
        return Err(BackendError::Rejected {
            operation,
            message: envelope.message,
        });
    }
    Ok(envelope.data)
}

/// `path` with `pairs` appended as a form-encoded query string.
fn with_query(path: &str, pairs: &[(&str, &str)]) -> Result<String, ConnectivityError> {
    let mut url = Url::parse(QUERY_BASE)
        .and_then(|base| base.join(path.trim_start_matches('/')))
        .map_err(|e| ConnectivityError::transport(format!("bad endpoint {path}: {e}")))?;
    url.query_pairs_mut().extend_pairs(pairs);

    Ok(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}
