//! Scriptable auth client for testing.
//!
//! This implementation is NOT meant for production use. Responses are
//! scripted by the test and no network traffic ever happens.

// Allow certain clippy lints for test-only code
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::{KeyFetchToken, SessionToken};

use super::{AuthClient, AuthError, KeyBundle, VerificationStatus};

fn unscripted<T>() -> Result<T, AuthError> {
    Err(AuthError::Transient {
        reason: "unscripted mock response".to_string(),
    })
}

/// Auth client whose responses are scripted by the test.
///
/// Each operation returns a clone of the most recently scripted
/// response and counts how often it was called, so tests can assert
/// both the outcome and the number of round trips an advance took.
pub struct MockAuthClient {
    verification: Mutex<Result<VerificationStatus, AuthError>>,
    keys: Mutex<Result<KeyBundle, AuthError>>,
    certificate: Mutex<Result<String, AuthError>>,
    verification_calls: AtomicUsize,
    keys_calls: AtomicUsize,
    certificate_calls: AtomicUsize,
}

impl MockAuthClient {
    /// Creates a mock whose operations all fail as transient until
    /// scripted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            verification: Mutex::new(unscripted()),
            keys: Mutex::new(unscripted()),
            certificate: Mutex::new(unscripted()),
            verification_calls: AtomicUsize::new(0),
            keys_calls: AtomicUsize::new(0),
            certificate_calls: AtomicUsize::new(0),
        }
    }

    /// Scripts the response for `check_verification`.
    pub fn respond_verification(&self, response: Result<VerificationStatus, AuthError>) {
        *self.verification.lock().unwrap() = response;
    }

    /// Scripts the response for `fetch_keys`.
    pub fn respond_keys(&self, response: Result<KeyBundle, AuthError>) {
        *self.keys.lock().unwrap() = response;
    }

    /// Scripts the response for `sign_certificate`.
    pub fn respond_certificate(&self, response: Result<String, AuthError>) {
        *self.certificate.lock().unwrap() = response;
    }

    /// Returns how many times `check_verification` was called.
    #[must_use]
    pub fn verification_calls(&self) -> usize {
        self.verification_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times `fetch_keys` was called.
    #[must_use]
    pub fn keys_calls(&self) -> usize {
        self.keys_calls.load(Ordering::SeqCst)
    }

    /// Returns how many times `sign_certificate` was called.
    #[must_use]
    pub fn certificate_calls(&self) -> usize {
        self.certificate_calls.load(Ordering::SeqCst)
    }

    /// Returns the total number of calls across all operations.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.verification_calls() + self.keys_calls() + self.certificate_calls()
    }
}

impl Default for MockAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthClient for MockAuthClient {
    async fn check_verification(
        &self,
        _session_token: &SessionToken,
    ) -> Result<VerificationStatus, AuthError> {
        self.verification_calls.fetch_add(1, Ordering::SeqCst);
        self.verification.lock().unwrap().clone()
    }

    async fn fetch_keys(&self, _key_fetch_token: &KeyFetchToken) -> Result<KeyBundle, AuthError> {
        self.keys_calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().clone()
    }

    async fn sign_certificate(
        &self,
        _session_token: &SessionToken,
        _public_key: &str,
    ) -> Result<String, AuthError> {
        self.certificate_calls.fetch_add(1, Ordering::SeqCst);
        self.certificate.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TOKEN_LENGTH;

    #[tokio::test]
    async fn test_unscripted_mock_fails_transient() {
        let mock = MockAuthClient::new();
        let token = SessionToken::new([0u8; TOKEN_LENGTH]);

        let err = mock.check_verification(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Transient { .. }));
        assert_eq!(mock.verification_calls(), 1);
        assert_eq!(mock.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_response_is_returned() {
        let mock = MockAuthClient::new();
        mock.respond_verification(Ok(VerificationStatus {
            email: "test@example.com".to_string(),
            verified: true,
        }));

        let token = SessionToken::new([0u8; TOKEN_LENGTH]);
        let status = mock.check_verification(&token).await.unwrap();
        assert!(status.verified);
        assert_eq!(status.email, "test@example.com");

        // Repeated calls replay the same response.
        let again = mock.check_verification(&token).await.unwrap();
        assert!(again.verified);
        assert_eq!(mock.verification_calls(), 2);
    }
}
