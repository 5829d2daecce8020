//! Contract with the remote auth service.
//!
//! The state machine consumes this boundary. [`HttpAuthClient`]
//! implements it over the real service; [`MockAuthClient`] scripts it
//! for tests.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{KeyFetchToken, SessionToken, SyncKey, TOKEN_LENGTH};

mod http;
mod mock;
mod request;

pub use http::HttpAuthClient;
pub use mock::MockAuthClient;

/// Typed failure from the auth service boundary.
///
/// Distinguishes recoverable hiccups from permanent credential verdicts
/// so the state machine can fail safely backward.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// Network or server hiccup. The caller may retry later; account
    /// state is left unchanged.
    #[error("transient: {reason}")]
    Transient {
        /// Description of the failure.
        reason: String,
    },
    /// The service rejected the presented token as invalid or expired.
    #[error("credentials_rejected")]
    CredentialRejected,
    /// The service explicitly invalidated the session.
    #[error("session_invalidated")]
    SessionInvalidated,
}

/// Result of polling the verification status of a session.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationStatus {
    /// Email address the session belongs to, as reported by the service.
    pub email: String,
    /// Whether the email address has been verified.
    pub verified: bool,
}

/// Wrapped key bundle fetched with a key-fetch token.
#[derive(Clone)]
pub struct KeyBundle {
    /// First derived key, usable as returned.
    pub ka: SyncKey,
    /// Wrapped kB. Must be unwrapped with the local unwrap key before
    /// use.
    pub wrapped_kb: [u8; TOKEN_LENGTH],
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyBundle(<redacted>)")
    }
}

/// Successful login or registration exchange with the auth service.
///
/// The exchange itself happens outside this crate; its result seeds a new
/// account via `Account::from_login_response`.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    /// Stable account identifier.
    pub uid: String,
    /// Email address as reported by the service.
    pub email: String,
    /// Session token issued by the exchange.
    pub session_token: SessionToken,
    /// One-time key-fetch token issued by the exchange.
    pub key_fetch_token: KeyFetchToken,
    /// Whether the email address was already verified.
    pub verified: bool,
}

/// Operations the state machine needs from the auth service.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Polls whether the session's email address has been verified.
    ///
    /// # Errors
    /// Fails with [`AuthError::CredentialRejected`] or
    /// [`AuthError::SessionInvalidated`] when the token is no longer
    /// accepted, [`AuthError::Transient`] otherwise.
    async fn check_verification(
        &self,
        session_token: &SessionToken,
    ) -> Result<VerificationStatus, AuthError>;

    /// Fetches the wrapped key bundle for a verified session.
    ///
    /// # Errors
    /// Same failure taxonomy as
    /// [`check_verification`](AuthClient::check_verification).
    async fn fetch_keys(&self, key_fetch_token: &KeyFetchToken) -> Result<KeyBundle, AuthError>;

    /// Requests a certificate signature over `public_key` and returns the
    /// opaque certificate string.
    ///
    /// # Errors
    /// Same failure taxonomy as
    /// [`check_verification`](AuthClient::check_verification).
    async fn sign_certificate(
        &self,
        session_token: &SessionToken,
        public_key: &str,
    ) -> Result<String, AuthError>;
}
