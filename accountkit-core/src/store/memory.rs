//! In-memory implementation of the secure store for testing.
//!
//! This implementation is NOT secure for production use. Blobs are held
//! in plaintext in process memory and provide no at-rest
//! confidentiality.

// Allow certain clippy lints for test-only code
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use super::{SecureStore, StoreResult};

/// In-memory secure store backed by a `HashMap`.
///
/// Thread-safe implementation for testing concurrent access patterns.
/// Tracks write counts so tests can assert checkpoint behavior.
pub struct MemorySecureStore {
    /// Storage for blobs, keyed by the derived state key.
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    /// Tracks `set` calls for testing.
    write_count: Mutex<u64>,
}

impl MemorySecureStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            write_count: Mutex::new(0),
        }
    }

    /// Returns the number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    /// Returns `true` if no blobs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().unwrap().is_empty()
    }

    /// Clears all stored blobs.
    pub fn clear(&self) {
        self.blobs.write().unwrap().clear();
    }

    /// Returns the number of times `set` has been called.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        *self.write_count.lock().unwrap()
    }

    /// Resets the write counter to zero.
    pub fn reset_write_count(&self) {
        *self.write_count.lock().unwrap() = 0;
    }
}

impl Default for MemorySecureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for MemorySecureStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.blobs
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        *self.write_count.lock().unwrap() += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.blobs.write().unwrap().remove(key);
        Ok(())
    }
}
