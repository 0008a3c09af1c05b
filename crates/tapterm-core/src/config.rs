//! Terminal configuration loading and validation.
//!
//! Configuration comes from a TOML file followed by `TAPTERM_*` environment
//! overrides. Every field has a default except the backend location and the
//! credential, which must be supplied; [`TerminalConfig::validate`] rejects a
//! configuration that leaves them empty.
//!
//! ```toml
//! [backend]
//! base_url = "http://192.168.43.202:8000/api"
//! api_token = "..."
//!
//! [identity]
//! terminal_id = "1"
//! device_id = "a4cf12"
//!
//! [timing]
//! dedupe_window_ms = 3000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::Error;
use crate::types::{DeviceId, TerminalId};
use crate::Result;

pub const ENV_BACKEND_URL: &str = "TAPTERM_BACKEND_URL";
pub const ENV_API_TOKEN: &str = "TAPTERM_API_TOKEN";
pub const ENV_TERMINAL_ID: &str = "TAPTERM_TERMINAL_ID";
pub const ENV_DEVICE_ID: &str = "TAPTERM_DEVICE_ID";
pub const ENV_PAYMENT_AMOUNT: &str = "TAPTERM_PAYMENT_AMOUNT";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub backend: BackendConfig,
    pub identity: IdentityConfig,
    pub payment: PaymentConfig,
    pub timing: TimingConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL including any path prefix, e.g. `http://host:8000/api`.
    pub base_url: String,
    pub api_token: String,
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub terminal_id: String,
    pub device_id: String,
}

impl IdentityConfig {
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the terminal id is empty.
    pub fn terminal_id(&self) -> Result<TerminalId> {
        TerminalId::new(&self.terminal_id)
    }

    /// # Errors
    /// Returns `Error::InvalidIdentifier` if the device id is empty.
    pub fn device_id(&self) -> Result<DeviceId> {
        DeviceId::new(&self.device_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Fixed amount charged per tap.
    pub amount: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            amount: DEFAULT_PAYMENT_AMOUNT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub scan_delay_ms: u64,
    pub dedupe_window_ms: u64,
    pub debounce_ms: u64,
    pub display_dwell_ms: u64,
    pub card_detected_dwell_ms: u64,
    pub retry_delay_ms: u64,
    pub session_refresh_interval_ms: u64,
    pub liveness_check_interval_ms: u64,
    pub reconnect_max_wait_ms: u64,
    pub idle_refresh_interval_ms: u64,
    pub fatal_dwell_ms: u64,
    pub watchdog_timeout_ms: u64,
    pub reader_poll_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            scan_delay_ms: DEFAULT_SCAN_DELAY_MS,
            dedupe_window_ms: DEFAULT_DEDUPE_WINDOW_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            display_dwell_ms: DEFAULT_DISPLAY_DWELL_MS,
            card_detected_dwell_ms: DEFAULT_CARD_DETECTED_DWELL_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            session_refresh_interval_ms: DEFAULT_SESSION_REFRESH_INTERVAL_MS,
            liveness_check_interval_ms: DEFAULT_LIVENESS_CHECK_INTERVAL_MS,
            reconnect_max_wait_ms: DEFAULT_RECONNECT_MAX_WAIT_MS,
            idle_refresh_interval_ms: DEFAULT_IDLE_REFRESH_INTERVAL_MS,
            fatal_dwell_ms: DEFAULT_FATAL_DWELL_MS,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            reader_poll_timeout_ms: DEFAULT_READER_POLL_TIMEOUT_MS,
        }
    }
}

impl TimingConfig {
    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
    }

    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn display_dwell(&self) -> Duration {
        Duration::from_millis(self.display_dwell_ms)
    }

    pub fn card_detected_dwell(&self) -> Duration {
        Duration::from_millis(self.card_detected_dwell_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn session_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.session_refresh_interval_ms)
    }

    pub fn liveness_check_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_check_interval_ms)
    }

    pub fn reconnect_max_wait(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_wait_ms)
    }

    pub fn idle_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.idle_refresh_interval_ms)
    }

    pub fn fatal_dwell(&self) -> Duration {
        Duration::from_millis(self.fatal_dwell_ms)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn reader_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_poll_timeout_ms)
    }
}

impl TerminalConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `Error::Config` if the document is not valid TOML for this schema.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Read the file, apply environment overrides and validate.
    ///
    /// # Errors
    /// Returns `Error::Config` if the file cannot be read or parsed, or the
    /// result does not pass [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are skipped and
    /// unparsable ones are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(url) = value(ENV_BACKEND_URL) {
            self.backend.base_url = url;
        }
        if let Some(token) = value(ENV_API_TOKEN) {
            self.backend.api_token = token;
        }
        if let Some(id) = value(ENV_TERMINAL_ID) {
            self.identity.terminal_id = id;
        }
        if let Some(id) = value(ENV_DEVICE_ID) {
            self.identity.device_id = id;
        }
        if let Some(raw) = value(ENV_PAYMENT_AMOUNT) {
            match raw.parse::<f64>() {
                Ok(amount) => self.payment.amount = amount,
                Err(err) => tracing::warn!("invalid {ENV_PAYMENT_AMOUNT}, ignoring: {err}"),
            }
        }
    }

    /// # Errors
    /// Returns `Error::Config` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend.base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("backend.base_url is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "backend.base_url must be http(s): '{url}'"
            )));
        }
        if self.backend.api_token.trim().is_empty() {
            return Err(Error::Config("backend.api_token is required".to_string()));
        }

        self.identity
            .terminal_id()
            .map_err(|e| Error::Config(format!("identity.terminal_id: {e}")))?;
        self.identity
            .device_id()
            .map_err(|e| Error::Config(format!("identity.device_id: {e}")))?;

        if !(self.payment.amount.is_finite() && self.payment.amount > 0.0) {
            return Err(Error::Config(format!(
                "payment.amount must be positive, got {}",
                self.payment.amount
            )));
        }

        let t = &self.timing;
        let required = [
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
            ("timing.scan_delay_ms", t.scan_delay_ms),
            ("timing.dedupe_window_ms", t.dedupe_window_ms),
            ("timing.debounce_ms", t.debounce_ms),
            ("timing.retry_delay_ms", t.retry_delay_ms),
            ("timing.session_refresh_interval_ms", t.session_refresh_interval_ms),
            ("timing.liveness_check_interval_ms", t.liveness_check_interval_ms),
            ("timing.reconnect_max_wait_ms", t.reconnect_max_wait_ms),
            ("timing.idle_refresh_interval_ms", t.idle_refresh_interval_ms),
            ("timing.watchdog_timeout_ms", t.watchdog_timeout_ms),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| *v == 0) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }

        if self.backend.request_timeout_ms >= t.watchdog_timeout_ms {
            return Err(Error::Config(format!(
                "backend.request_timeout_ms ({}) must be below timing.watchdog_timeout_ms ({})",
                self.backend.request_timeout_ms, t.watchdog_timeout_ms
            )));
        }
        if t.reconnect_max_wait_ms >= t.watchdog_timeout_ms {
            return Err(Error::Config(format!(
                "timing.reconnect_max_wait_ms ({}) must be below timing.watchdog_timeout_ms ({})",
                t.reconnect_max_wait_ms, t.watchdog_timeout_ms
            )));
        }

        Ok(())
    }
}
