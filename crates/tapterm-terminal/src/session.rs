//! Terminal authorization state.
//!
//! The session holds what the backend last granted this terminal. It is
//! replaced as a whole by a successful authentication and left untouched by
//! a failed one, so a flaky backend cannot flip an active terminal off in
//! the middle of the day. Failures arm a backoff instead.

use std::time::{Duration, Instant};

use tapterm_core::{
    AllowedUserTypes, Capability, CapabilitySet, ConnectivityError, Error, Result,
};
use tapterm_network::{AuthGrant, BackendClient, BackendError, HttpTransport, LinkStatus};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct TerminalSession {
    capabilities: CapabilitySet,
    allowed_user_types: AllowedUserTypes,
    is_active: bool,
    next_auth_attempt_at: Option<Instant>,
    retry_delay: Duration,
}

impl TerminalSession {
    /// Inactive session with no capabilities; the first refresh is not
    /// backed off.
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            capabilities: CapabilitySet::empty(),
            allowed_user_types: AllowedUserTypes::default(),
            is_active: false,
            next_auth_attempt_at: None,
            retry_delay,
        }
    }

    /// Session preloaded with a grant, as if a refresh had just succeeded.
    pub fn with_grant(
        retry_delay: Duration,
        capabilities: CapabilitySet,
        allowed_user_types: AllowedUserTypes,
        is_active: bool,
    ) -> Self {
        let mut session = Self::new(retry_delay);
        session.apply(AuthGrant {
            capabilities,
            allowed_user_types,
            is_active,
        });
        session
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Granted capabilities, regardless of whether the session is active.
    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn allowed_user_types(&self) -> &AllowedUserTypes {
        &self.allowed_user_types
    }

    pub fn next_auth_attempt_at(&self) -> Option<Instant> {
        self.next_auth_attempt_at
    }

    /// Whether `capability` may be used now. Flags are only trusted while
    /// the session is active.
    pub fn supports(&self, capability: Capability) -> bool {
        self.is_active && self.capabilities.contains(capability)
    }

    /// Re-authenticate, reporting why nothing changed.
    ///
    /// Inside the backoff window this is a no-op returning the cached
    /// `is_active`.
    ///
    /// # Errors
    ///
    /// - `Error::Connectivity(LinkDown)` when the link is unavailable; no
    ///   request is made and no backoff is armed.
    /// - `Error::Connectivity` or `Error::Auth` when the backend could not be
    ///   reached or refused; the prior state is kept and the next attempt is
    ///   pushed to `now + retry_delay`.
    pub async fn try_refresh<T: HttpTransport>(
        &mut self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        now: Instant,
    ) -> Result<bool> {
        if let Some(next) = self.next_auth_attempt_at
            && now < next
        {
            debug!(
                wait_ms = (next - now).as_millis() as u64,
                "Authentication backed off"
            );
            return Ok(self.is_active);
        }

        if !link.is_available() {
            return Err(ConnectivityError::LinkDown.into());
        }

        match backend.authenticate(link).await {
            Ok(grant) => {
                self.apply(grant);
                Ok(self.is_active)
            }
            Err(e) => {
                self.next_auth_attempt_at = Some(now + self.retry_delay);
                warn!(
                    error = %e,
                    kept_active = self.is_active,
                    retry_in_ms = self.retry_delay.as_millis() as u64,
                    "Authentication failed, keeping previous session"
                );
                Err(match e {
                    BackendError::Connectivity(e) => Error::Connectivity(e),
                    rejected @ BackendError::Rejected { .. } => Error::auth(rejected.reason()),
                })
            }
        }
    }

    /// Re-authenticate and return the resulting `is_active`.
    ///
    /// Failures are absorbed; see [`try_refresh`](Self::try_refresh).
    pub async fn refresh<T: HttpTransport>(
        &mut self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        now: Instant,
    ) -> bool {
        match self.try_refresh(backend, link, now).await {
            Ok(active) => active,
            Err(e) => {
                debug!(error = %e, "Session refresh had no effect");
                self.is_active
            }
        }
    }

    fn apply(&mut self, grant: AuthGrant) {
        let AuthGrant {
            capabilities,
            allowed_user_types,
            is_active,
        } = grant;

        if self.is_active != is_active {
            info!(is_active, "Terminal activation changed");
        }
        self.capabilities = capabilities;
        self.allowed_user_types = allowed_user_types;
        self.is_active = is_active;
        self.next_auth_attempt_at = None;
    }
}
