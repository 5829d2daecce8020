//! Login state machine.
//!
//! Drives an [`AccountState`] forward by performing the network step the
//! current variant calls for, one step at a time, until no further
//! progress is possible. Failures never move a state forward: transient
//! hiccups leave it unchanged, credential verdicts collapse it backward.

use crate::client::{AuthClient, AuthError};
use crate::error::AccountError;
use crate::state::{AccountState, Cohabiting, Doghouse, EngagedAfterVerified, Married};
use crate::types::{Certificate, DeviceRegistration};

/// How long an unverified user waits before `last_notified_at` is
/// refreshed on the next advance.
pub const VERIFICATION_RENOTIFY_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Requested lifetime of a signed device certificate.
pub const CERTIFICATE_LIFETIME_MS: u64 = 24 * 60 * 60 * 1000;

/// A certificate within this margin of expiry is re-signed on advance.
pub const CERTIFICATE_FRESHNESS_THRESHOLD_MS: u64 = 30 * 60 * 1000;

/// Advances account states against an auth client.
///
/// Holds no state of its own; `now` is supplied by the caller so
/// timestamp-gated behavior stays deterministic under test.
pub struct LoginStateMachine<'a, C: AuthClient> {
    client: &'a C,
}

impl<'a, C: AuthClient> LoginStateMachine<'a, C> {
    /// Creates a machine that performs its network steps through `client`.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Advances `state` as far as the auth service allows.
    ///
    /// Steps repeat until a fixed point: a verified engagement continues
    /// straight through key fetching and certificate signing when the
    /// service cooperates. A step that stays within the same variant
    /// (a refreshed notification timestamp or certificate) ends the
    /// advance.
    ///
    /// # Errors
    /// Fails with [`AccountError::Transient`] only when a network hiccup
    /// prevented any progress at all; partial progress is returned as
    /// the new state instead. Credential verdicts are not errors: they
    /// collapse the state to `Separated`, or to `Doghouse` when the
    /// service invalidates a `Married` session.
    pub async fn advance(&self, state: AccountState, now: u64) -> Result<AccountState, AccountError> {
        let mut current = state;
        let mut progressed = false;
        loop {
            match self.step(&current, now).await {
                Ok(next) => {
                    if next == current {
                        return Ok(current);
                    }
                    let same_stage = next.label() == current.label();
                    current = next;
                    progressed = true;
                    if same_stage {
                        return Ok(current);
                    }
                }
                Err(AuthError::Transient { reason }) => {
                    if progressed {
                        tracing::debug!(
                            state = current.label(),
                            reason,
                            "transient failure after partial progress"
                        );
                        return Ok(current);
                    }
                    return Err(AccountError::Transient { reason });
                }
                Err(AuthError::CredentialRejected) => {
                    tracing::warn!(from = current.label(), "credentials rejected, separating");
                    current = AccountState::Separated;
                    progressed = true;
                }
                Err(AuthError::SessionInvalidated) => {
                    tracing::warn!(from = current.label(), "session invalidated");
                    current = match current {
                        AccountState::Married(married) => AccountState::Doghouse(Doghouse {
                            session_token: married.session_token,
                        }),
                        _ => AccountState::Separated,
                    };
                    progressed = true;
                }
            }
        }
    }

    /// Performs the single network step the current variant calls for.
    async fn step(&self, state: &AccountState, now: u64) -> Result<AccountState, AuthError> {
        match state {
            AccountState::Separated | AccountState::Doghouse(_) => Ok(state.clone()),
            AccountState::EngagedBeforeVerified(engaged) => {
                let status = self.client.check_verification(&engaged.session_token).await?;
                if status.verified {
                    return Ok(AccountState::EngagedAfterVerified(EngagedAfterVerified {
                        session_token: engaged.session_token.clone(),
                        key_fetch_token: engaged.key_fetch_token.clone(),
                        unwrap_key: engaged.unwrap_key.clone(),
                    }));
                }
                let mut next = engaged.clone();
                if now.saturating_sub(next.last_notified_at) >= VERIFICATION_RENOTIFY_INTERVAL_MS {
                    next.last_notified_at = now;
                }
                Ok(AccountState::EngagedBeforeVerified(next))
            }
            AccountState::EngagedAfterVerified(engaged) => {
                let bundle = self.client.fetch_keys(&engaged.key_fetch_token).await?;
                let kb = engaged.unwrap_key.unwrap_kb(&bundle.wrapped_kb);
                Ok(AccountState::Cohabiting(Cohabiting {
                    session_token: engaged.session_token.clone(),
                    ka: bundle.ka,
                    kb,
                }))
            }
            AccountState::Cohabiting(cohabiting) => {
                let public_key = hex::encode(rand::random::<[u8; 32]>());
                let cert = self
                    .client
                    .sign_certificate(&cohabiting.session_token, &public_key)
                    .await?;
                Ok(AccountState::Married(Married {
                    session_token: cohabiting.session_token.clone(),
                    ka: cohabiting.ka.clone(),
                    kb: cohabiting.kb.clone(),
                    certificate: Certificate {
                        value: cert,
                        expires_at: now.saturating_add(CERTIFICATE_LIFETIME_MS),
                    },
                    device_registration: DeviceRegistration::mint(public_key),
                }))
            }
            AccountState::Married(married) => {
                if married
                    .certificate
                    .is_valid_for(now, CERTIFICATE_FRESHNESS_THRESHOLD_MS)
                {
                    return Ok(AccountState::Married(married.clone()));
                }
                let cert = self
                    .client
                    .sign_certificate(&married.session_token, &married.device_registration.public_key)
                    .await?;
                let mut next = married.clone();
                next.certificate = Certificate {
                    value: cert,
                    expires_at: now.saturating_add(CERTIFICATE_LIFETIME_MS),
                };
                Ok(AccountState::Married(next))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::client::{KeyBundle, MockAuthClient, VerificationStatus};
    use crate::state::EngagedBeforeVerified;
    use crate::types::{KeyFetchToken, SessionToken, SyncKey, UnwrapKey, TOKEN_LENGTH};

    fn engaged_before_verified(last_notified_at: u64) -> AccountState {
        AccountState::EngagedBeforeVerified(EngagedBeforeVerified {
            session_token: SessionToken::new([1u8; TOKEN_LENGTH]),
            key_fetch_token: KeyFetchToken::new([2u8; TOKEN_LENGTH]),
            unwrap_key: UnwrapKey::new([3u8; TOKEN_LENGTH]),
            first_seen_at: 0,
            last_notified_at,
        })
    }

    fn engaged_after_verified() -> AccountState {
        AccountState::EngagedAfterVerified(EngagedAfterVerified {
            session_token: SessionToken::new([1u8; TOKEN_LENGTH]),
            key_fetch_token: KeyFetchToken::new([2u8; TOKEN_LENGTH]),
            unwrap_key: UnwrapKey::new([3u8; TOKEN_LENGTH]),
        })
    }

    fn cohabiting() -> AccountState {
        AccountState::Cohabiting(Cohabiting {
            session_token: SessionToken::new([1u8; TOKEN_LENGTH]),
            ka: SyncKey::new([4u8; TOKEN_LENGTH]),
            kb: SyncKey::new([5u8; TOKEN_LENGTH]),
        })
    }

    fn married(expires_at: u64) -> AccountState {
        AccountState::Married(Married {
            session_token: SessionToken::new([1u8; TOKEN_LENGTH]),
            ka: SyncKey::new([4u8; TOKEN_LENGTH]),
            kb: SyncKey::new([5u8; TOKEN_LENGTH]),
            certificate: Certificate {
                value: "cert-original".to_string(),
                expires_at,
            },
            device_registration: DeviceRegistration {
                device_id: "device-1".to_string(),
                public_key: "aabb".to_string(),
            },
        })
    }

    fn verified(verified: bool) -> VerificationStatus {
        VerificationStatus {
            email: "test@example.com".to_string(),
            verified,
        }
    }

    #[tokio::test]
    async fn test_separated_and_doghouse_are_terminal() {
        let mock = MockAuthClient::new();
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(AccountState::Separated, 0).await.unwrap();
        assert_eq!(state, AccountState::Separated);

        let doghouse = AccountState::Doghouse(Doghouse {
            session_token: SessionToken::new([1u8; TOKEN_LENGTH]),
        });
        let state = machine.advance(doghouse.clone(), 0).await.unwrap();
        assert_eq!(state, doghouse);

        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_verification_advances_to_engaged_after_verified() {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(verified(true)));
        let machine = LoginStateMachine::new(&mock);

        // Key fetch is left unscripted, so the advance stops after the
        // verification step with its partial progress.
        let state = machine.advance(engaged_before_verified(0), 100).await.unwrap();
        assert_eq!(state.label(), "engagedAfterVerified");
        assert_eq!(mock.verification_calls(), 1);
    }

    #[test_case(VERIFICATION_RENOTIFY_INTERVAL_MS - 1, 500 ; "before the gate")]
    #[test_case(VERIFICATION_RENOTIFY_INTERVAL_MS, 500 + VERIFICATION_RENOTIFY_INTERVAL_MS ; "at the gate")]
    #[tokio::test]
    async fn test_unverified_renotify_gate(elapsed: u64, expected_last_notified: u64) {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(verified(false)));
        let machine = LoginStateMachine::new(&mock);

        let now = 500 + elapsed;
        let state = machine.advance(engaged_before_verified(500), now).await.unwrap();
        let AccountState::EngagedBeforeVerified(engaged) = state else {
            panic!("expected EngagedBeforeVerified");
        };
        assert_eq!(engaged.last_notified_at, expected_last_notified);
        assert_eq!(mock.verification_calls(), 1);
    }

    #[tokio::test]
    async fn test_key_fetch_unwraps_kb() {
        let mock = MockAuthClient::new();
        mock.respond_keys(Ok(KeyBundle {
            ka: SyncKey::new([7u8; TOKEN_LENGTH]),
            wrapped_kb: [0xFF; TOKEN_LENGTH],
        }));
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(engaged_after_verified(), 0).await.unwrap();
        let AccountState::Cohabiting(cohabiting) = state else {
            panic!("expected Cohabiting");
        };
        assert_eq!(cohabiting.ka.as_bytes(), &[7u8; TOKEN_LENGTH]);
        // wrapped 0xFF xor unwrap key 0x03 = 0xFC
        assert_eq!(cohabiting.kb.as_bytes(), &[0xFC; TOKEN_LENGTH]);
    }

    #[tokio::test]
    async fn test_certificate_signing_reaches_married() {
        let mock = MockAuthClient::new();
        mock.respond_certificate(Ok("cert-signed".to_string()));
        let machine = LoginStateMachine::new(&mock);

        let now = 1_000;
        let state = machine.advance(cohabiting(), now).await.unwrap();
        let AccountState::Married(married) = state else {
            panic!("expected Married");
        };
        assert_eq!(married.certificate.value, "cert-signed");
        assert_eq!(married.certificate.expires_at, now + CERTIFICATE_LIFETIME_MS);
        assert!(!married.device_registration.device_id.is_empty());
        assert_eq!(married.device_registration.public_key.len(), 64);
        assert_eq!(mock.certificate_calls(), 1);
    }

    #[tokio::test]
    async fn test_married_with_fresh_certificate_is_unchanged() {
        let mock = MockAuthClient::new();
        let machine = LoginStateMachine::new(&mock);

        let state = married(CERTIFICATE_LIFETIME_MS);
        let advanced = machine.advance(state.clone(), 0).await.unwrap();
        assert_eq!(advanced, state);
        assert_eq!(mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_married_refreshes_certificate_near_expiry() {
        let mock = MockAuthClient::new();
        mock.respond_certificate(Ok("cert-refreshed".to_string()));
        let machine = LoginStateMachine::new(&mock);

        // now is within the freshness threshold of expiry.
        let now = CERTIFICATE_LIFETIME_MS - CERTIFICATE_FRESHNESS_THRESHOLD_MS;
        let state = machine.advance(married(CERTIFICATE_LIFETIME_MS), now).await.unwrap();
        let AccountState::Married(refreshed) = state else {
            panic!("expected Married");
        };
        assert_eq!(refreshed.certificate.value, "cert-refreshed");
        assert_eq!(refreshed.certificate.expires_at, now + CERTIFICATE_LIFETIME_MS);
        // The device registration survives a refresh.
        assert_eq!(refreshed.device_registration.device_id, "device-1");
        assert_eq!(mock.certificate_calls(), 1);
    }

    #[tokio::test]
    async fn test_credential_rejection_collapses_to_separated() {
        let mock = MockAuthClient::new();
        mock.respond_keys(Err(AuthError::CredentialRejected));
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(engaged_after_verified(), 0).await.unwrap();
        assert_eq!(state, AccountState::Separated);
    }

    #[tokio::test]
    async fn test_session_invalidation_from_married_moves_to_doghouse() {
        let mock = MockAuthClient::new();
        mock.respond_certificate(Err(AuthError::SessionInvalidated));
        let machine = LoginStateMachine::new(&mock);

        // Certificate past the freshness threshold forces a refresh.
        let state = machine
            .advance(married(CERTIFICATE_LIFETIME_MS), CERTIFICATE_LIFETIME_MS)
            .await
            .unwrap();
        let AccountState::Doghouse(doghouse) = state else {
            panic!("expected Doghouse");
        };
        assert_eq!(
            doghouse.session_token,
            SessionToken::new([1u8; TOKEN_LENGTH])
        );
    }

    #[tokio::test]
    async fn test_session_invalidation_before_married_separates() {
        let mock = MockAuthClient::new();
        mock.respond_certificate(Err(AuthError::SessionInvalidated));
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(cohabiting(), 0).await.unwrap();
        assert_eq!(state, AccountState::Separated);
    }

    #[tokio::test]
    async fn test_transient_failure_without_progress_surfaces() {
        let mock = MockAuthClient::new();
        let machine = LoginStateMachine::new(&mock);

        let err = machine.advance(engaged_after_verified(), 0).await.unwrap_err();
        assert!(matches!(err, AccountError::Transient { .. }));
    }

    #[tokio::test]
    async fn test_transient_failure_after_progress_keeps_progress() {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(verified(true)));
        // Key fetch stays unscripted and fails as transient.
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(engaged_before_verified(0), 0).await.unwrap();
        assert_eq!(state.label(), "engagedAfterVerified");
    }

    #[tokio::test]
    async fn test_full_chain_reaches_married_in_one_advance() {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(verified(true)));
        mock.respond_keys(Ok(KeyBundle {
            ka: SyncKey::new([7u8; TOKEN_LENGTH]),
            wrapped_kb: [0u8; TOKEN_LENGTH],
        }));
        mock.respond_certificate(Ok("cert".to_string()));
        let machine = LoginStateMachine::new(&mock);

        let state = machine.advance(engaged_before_verified(0), 0).await.unwrap();
        assert_eq!(state.label(), "married");
        assert_eq!(mock.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_advance_is_idempotent_under_constant_responses() {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(verified(true)));
        mock.respond_keys(Ok(KeyBundle {
            ka: SyncKey::new([7u8; TOKEN_LENGTH]),
            wrapped_kb: [0u8; TOKEN_LENGTH],
        }));
        mock.respond_certificate(Ok("cert".to_string()));
        let machine = LoginStateMachine::new(&mock);

        let once = machine.advance(engaged_before_verified(0), 0).await.unwrap();
        let twice = machine.advance(once.clone(), 0).await.unwrap();
        assert_eq!(once, twice);
    }
}
