//! Core constants for the terminal control engine.
//!
//! Backend routes, header names, device limits and the default timing values
//! used when the configuration file leaves a field out. Timing defaults are in
//! milliseconds, matching the `*_ms` configuration keys.
//!
//! # Usage
//!
//! ```
//! use tapterm_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(PATH_AUTHENTICATE, "/terminal/authenticate");
//!
//! let timeout = Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS);
//! assert!(timeout < Duration::from_millis(DEFAULT_WATCHDOG_TIMEOUT_MS));
//! ```

// ============================================================================
// Backend Routes
// ============================================================================

/// Terminal authentication (POST).
pub const PATH_AUTHENTICATE: &str = "/terminal/authenticate";

/// Card and user lookup (GET, query `card_uid` and `terminal_id`).
pub const PATH_CARD_INFO: &str = "/terminal/cards/info";

/// Payment submission (POST).
pub const PATH_PROCESS_PAYMENT: &str = "/terminal/process-payment";

/// Access verification (POST).
pub const PATH_VERIFY_ACCESS: &str = "/terminal/access/verify";

/// Access event recording (POST).
pub const PATH_RECORD_ACCESS: &str = "/terminal/transactions/record-access";

// ============================================================================
// Request Headers
// ============================================================================

/// Bearer credential header.
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Device identifier header attached to every backend call.
pub const HEADER_DEVICE_ID: &str = "X-Device-ID";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

pub const CONTENT_TYPE_JSON: &str = "application/json";

// ============================================================================
// Device Limits
// ============================================================================

/// Minimum UID length in bytes accepted from the reader.
pub const MIN_UID_BYTES: usize = 1;

/// Maximum UID length in bytes (ISO14443A triple-size UIDs are 10, the
/// reader used here reports at most 7).
pub const MAX_UID_BYTES: usize = 7;

/// Cards remembered by the dedupe gate at once; the oldest is evicted first.
pub const MAX_TRACKED_CARDS: usize = 16;

/// Maximum number of allowed user types kept from an authentication response.
pub const MAX_ALLOWED_USER_TYPES: usize = 3;

/// Display geometry (16x2 character LCD).
pub const DISPLAY_COLUMNS: usize = 16;
pub const DISPLAY_LINES: usize = 2;

/// Number of firmware probes before the reader is declared missing.
pub const READER_PROBE_ATTEMPTS: u32 = 3;

/// Delay between reader firmware probes.
pub const READER_PROBE_INTERVAL_MS: u64 = 500;

// ============================================================================
// Default Timing (milliseconds)
// ============================================================================

/// Minimum delay between two reader polls.
pub const DEFAULT_SCAN_DELAY_MS: u64 = 500;

/// Window during which the same UID is not accepted twice.
pub const DEFAULT_DEDUPE_WINDOW_MS: u64 = 3_000;

/// Control input debounce interval.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// How long a result message stays on screen.
pub const DEFAULT_DISPLAY_DWELL_MS: u64 = 1_500;

/// How long the "card detected" message stays on screen.
pub const DEFAULT_CARD_DETECTED_DWELL_MS: u64 = 800;

/// Backoff after a failed authentication.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 3_000;

/// Periodic session refresh (10 minutes).
pub const DEFAULT_SESSION_REFRESH_INTERVAL_MS: u64 = 600_000;

/// Periodic link liveness check.
pub const DEFAULT_LIVENESS_CHECK_INTERVAL_MS: u64 = 10_000;

/// Upper bound on a single reconnection attempt.
pub const DEFAULT_RECONNECT_MAX_WAIT_MS: u64 = 6_000;

/// Idle screen refresh.
pub const DEFAULT_IDLE_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Backend request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;

/// Minimum time a fatal message stays visible before restart.
pub const DEFAULT_FATAL_DWELL_MS: u64 = 5_000;

/// Hardware watchdog period. Request timeouts must stay below it.
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 10_000;

/// How long a single reader poll waits for a card.
pub const DEFAULT_READER_POLL_TIMEOUT_MS: u64 = 100;

/// Fixed charge per payment tap.
pub const DEFAULT_PAYMENT_AMOUNT: f64 = 5_000.0;
