//! Card validation pipeline.
//!
//! Resolves a UID to fresh card and user facts and applies terminal policy.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. link available
//! 2. backend lookup
//! 3. card not blocked
//! 4. user active
//! 5. user type allowed on this terminal
//!
//! Anything ambiguous is a refusal. Lookup results are never cached.

use tapterm_core::{CardRecord, CardUid, ConnectivityError, ValidationError};
use tapterm_network::{BackendClient, BackendError, HttpTransport, LinkStatus};
use tracing::{info, warn};

use crate::session::TerminalSession;

#[derive(Debug, Clone, Copy, Default)]
pub struct CardValidator;

impl CardValidator {
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    ///
    /// The first failed check, as a [`ValidationError`].
    pub async fn validate<T: HttpTransport>(
        &self,
        backend: &BackendClient<T>,
        link: &impl LinkStatus,
        session: &TerminalSession,
        uid: &CardUid,
    ) -> Result<CardRecord, ValidationError> {
        if !link.is_available() {
            return Err(ConnectivityError::LinkDown.into());
        }

        let record = backend.card_info(link, uid).await.map_err(|e| match e {
            BackendError::Connectivity(e) => ValidationError::Connectivity(e),
            rejected @ BackendError::Rejected { .. } => ValidationError::Backend {
                message: rejected.reason(),
            },
        })?;

        let verdict = check_policy(&record, session);
        match &verdict {
            Ok(()) => info!(%uid, user_type = %record.user_type, "Card valid"),
            Err(reason) => warn!(%uid, %reason, "Card refused"),
        }
        verdict.map(|()| record)
    }
}

fn check_policy(record: &CardRecord, session: &TerminalSession) -> Result<(), ValidationError> {
    if record.is_blocked {
        return Err(ValidationError::Blocked);
    }
    if !record.is_user_active {
        return Err(ValidationError::UserInactive);
    }
    if !session.allowed_user_types().allows(&record.user_type) {
        return Err(ValidationError::TypeNotAllowed {
            user_type: record.user_type.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    fn session_allowing(types: &[&str]) -> TerminalSession {
        TerminalSession::with_grant(
            Duration::from_secs(3),
            tapterm_core::CapabilitySet::empty(),
            tapterm_core::AllowedUserTypes::truncating(types.iter().copied()),
            true,
        )
    }

    fn record(user_type: &str, blocked: bool, active: bool) -> CardRecord {
        CardRecord {
            user_name: "Ana".into(),
            user_type: user_type.into(),
            balance: 0.0,
            is_blocked: blocked,
            is_user_active: active,
        }
    }

    #[rstest]
    #[case("student", true)]
    #[case("student", false)]
    #[case("visitor", true)]
    #[case("visitor", false)]
    fn test_blocked_wins_over_everything(#[case] user_type: &str, #[case] active: bool) {
        let session = session_allowing(&["student"]);
        assert_eq!(
            check_policy(&record(user_type, true, active), &session),
            Err(ValidationError::Blocked)
        );
    }

    #[test]
    fn test_inactive_checked_before_type() {
        let session = session_allowing(&["student"]);
        assert_eq!(
            check_policy(&record("visitor", false, false), &session),
            Err(ValidationError::UserInactive)
        );
    }

    #[rstest]
    #[case("student", true)]
    #[case("staff", false)]
    #[case("Student", false)]
    fn test_type_allow_list(#[case] user_type: &str, #[case] allowed: bool) {
        let session = session_allowing(&["student"]);
        let verdict = check_policy(&record(user_type, false, true), &session);
        assert_eq!(verdict.is_ok(), allowed);
    }
}
