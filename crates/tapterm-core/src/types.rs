use crate::{
    Result,
    constants::{MAX_ALLOWED_USER_TYPES, MAX_UID_BYTES, MIN_UID_BYTES},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Card UID in normalized form: uppercase hex bytes joined by `:`.
///
/// # Security
/// Comparison is constant-time so the dedupe check does not leak how many
/// leading bytes of two UIDs match.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Build a UID from raw reader bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if the UID is empty or longer than
    /// [`MAX_UID_BYTES`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let len = bytes.len();
        if !(MIN_UID_BYTES..=MAX_UID_BYTES).contains(&len) {
            return Err(Error::InvalidCardUid(format!(
                "UID must be {MIN_UID_BYTES}-{MAX_UID_BYTES} bytes, got {len}"
            )));
        }

        let formatted = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        Ok(CardUid(formatted))
    }

    /// Parse a UID typed as hex, with or without `:`, `-` or space separators.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` for non-hex input, an odd digit count,
    /// or a byte length outside the supported range.
    pub fn parse(text: &str) -> Result<Self> {
        let digits: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect();

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidCardUid(format!("UID is not hex: '{text}'")));
        }
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(Error::InvalidCardUid(format!(
                "UID must be an even number of hex digits: '{text}'"
            )));
        }

        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidCardUid(format!("UID is not hex: '{text}'")))?;

        CardUid::from_bytes(&bytes)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of bytes in the UID.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.0.len().div_ceil(3)
    }

    /// At most `max` leading characters, for narrow displays.
    #[must_use]
    pub fn short(&self, max: usize) -> &str {
        let end = self.0.len().min(max);
        &self.0[..end]
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::parse(s)
    }
}

impl TryFrom<String> for CardUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardUid::parse(&value)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> Self {
        uid.0
    }
}

impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

fn validate_identifier(kind: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidIdentifier(format!("{kind} must not be empty")));
    }
    if !value.is_ascii() || value.chars().any(|c| c.is_ascii_control()) {
        return Err(Error::InvalidIdentifier(format!(
            "{kind} must be printable ASCII: '{value}'"
        )));
    }
    Ok(value.to_string())
}

/// Terminal identifier assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminalId(String);

impl TerminalId {
    /// # Errors
    /// Returns `Error::InvalidIdentifier` for empty or non-ASCII input.
    pub fn new(value: &str) -> Result<Self> {
        validate_identifier("terminal id", value).map(TerminalId)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hardware identifier of this physical device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// # Errors
    /// Returns `Error::InvalidIdentifier` for empty or non-ASCII input.
    pub fn new(value: &str) -> Result<Self> {
        validate_identifier("device id", value).map(DeviceId)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active terminal mode, toggled by the physical control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    #[default]
    Payment,
    Access,
}

impl OperationMode {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            OperationMode::Payment => OperationMode::Access,
            OperationMode::Access => OperationMode::Payment,
        }
    }

    /// Capability the backend must grant before this mode may execute.
    #[must_use]
    pub fn required_capability(self) -> Capability {
        match self {
            OperationMode::Payment => Capability::Payment,
            OperationMode::Access => Capability::Access,
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperationMode::Payment => write!(f, "payment"),
            OperationMode::Access => write!(f, "access"),
        }
    }
}

/// Backend-granted permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Capability {
    Payment = 0b0001,
    Topup = 0b0010,
    Transfer = 0b0100,
    Access = 0b1000,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Payment,
        Capability::Topup,
        Capability::Transfer,
        Capability::Access,
    ];

    #[inline]
    fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capability::Payment => write!(f, "payment"),
            Capability::Topup => write!(f, "topup"),
            Capability::Transfer => write!(f, "transfer"),
            Capability::Access => write!(f, "access"),
        }
    }
}

/// Set of [`Capability`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    #[must_use]
    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

/// User roles admitted by this terminal, at most [`MAX_ALLOWED_USER_TYPES`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedUserTypes(Vec<String>);

impl AllowedUserTypes {
    /// Keep the first [`MAX_ALLOWED_USER_TYPES`] entries, dropping the rest.
    pub fn truncating<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            types
                .into_iter()
                .take(MAX_ALLOWED_USER_TYPES)
                .map(Into::into)
                .collect(),
        )
    }

    /// Exact, case-sensitive membership.
    #[must_use]
    pub fn allows(&self, user_type: &str) -> bool {
        self.0.iter().any(|t| t == user_type)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Card and user facts resolved by the backend for one validation.
///
/// Never cached: every validation and every post-payment balance display
/// uses a fresh lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRecord {
    pub user_name: String,
    pub user_type: String,
    pub balance: f64,
    pub is_blocked: bool,
    pub is_user_active: bool,
}
