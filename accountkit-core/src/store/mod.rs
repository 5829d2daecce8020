//! Secure persistence boundary for serialized account state.
//!
//! The store provides at-rest confidentiality; the core hands it
//! plaintext JSON documents and trusts the adapter to encrypt them.
//! Entries are keyed by an indirection label so the non-sensitive
//! account record never names its secrets directly.

use thiserror::Error;

use crate::types::StateLabel;

mod memory;

pub use memory::MemorySecureStore;

/// Prefix for secure-store keys holding serialized account state.
pub const STATE_KEY_PREFIX: &str = "account.state.";

/// Derives the secure-store key for a state label.
#[must_use]
pub fn state_key(label: &StateLabel) -> String {
    format!("{STATE_KEY_PREFIX}{label}")
}

/// Failure inside a secure-store adapter.
#[derive(Debug, Error)]
#[error("{context}")]
pub struct StoreError {
    /// Adapter-provided description of the failure.
    pub context: String,
}

impl StoreError {
    /// Creates a store error from a description of the failure.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque encrypted key-value storage for account state blobs.
///
/// Writes must be atomic: a concurrent reader observes either the full
/// old value or the full new value, never a partial blob.
pub trait SecureStore: Send + Sync {
    /// Reads the blob stored under `key`.
    ///
    /// # Errors
    /// Returns an error only for adapter failures. A missing key is
    /// `Ok(None)`.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes `value` under `key`, replacing any existing blob.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Removes the blob stored under `key`.
    ///
    /// # Errors
    /// Returns `Ok(())` when the key is absent; errors are reserved for
    /// adapter failures.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key_derivation() {
        let label = StateLabel::new("abc-123".to_string());
        assert_eq!(state_key(&label), "account.state.abc-123");
    }
}
