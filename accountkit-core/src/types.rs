//! Core type definitions for the account state machine.
//!
//! Tokens and keys issued by the auth service are fixed-width byte strings.
//! Each newtype keeps its bytes out of `Debug` output and zeroizes them on
//! drop; on the wire they are hex-encoded strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Byte length of every token and key the auth service issues.
pub const TOKEN_LENGTH: usize = 32;

// Tokens and keys

/// Server-issued credential authorizing further account operations.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken([u8; TOKEN_LENGTH]);

impl SessionToken {
    /// Creates a new `SessionToken` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TOKEN_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the token.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }

    /// Converts the token to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates a `SessionToken` from a hexadecimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(<redacted>)")
    }
}

impl Serialize for SessionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SessionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// One-time credential used to retrieve the wrapped key bundle.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyFetchToken([u8; TOKEN_LENGTH]);

impl KeyFetchToken {
    /// Creates a new `KeyFetchToken` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TOKEN_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the token.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }

    /// Converts the token to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates a `KeyFetchToken` from a hexadecimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for KeyFetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyFetchToken(<redacted>)")
    }
}

impl Serialize for KeyFetchToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KeyFetchToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Local secret used to unwrap the fetched key bundle into a usable kB.
///
/// Derived from the user's password during the login exchange and never
/// sent to the server.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UnwrapKey([u8; TOKEN_LENGTH]);

impl UnwrapKey {
    /// Creates a new `UnwrapKey` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TOKEN_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the key.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }

    /// Converts the key to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates an `UnwrapKey` from a hexadecimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Unwraps a server-provided wrapped kB into a usable sync key.
    #[must_use]
    pub fn unwrap_kb(&self, wrapped_kb: &[u8; TOKEN_LENGTH]) -> SyncKey {
        let mut out = [0u8; TOKEN_LENGTH];
        for ((out_byte, wrapped), key) in out.iter_mut().zip(wrapped_kb).zip(&self.0) {
            *out_byte = wrapped ^ key;
        }
        SyncKey::new(out)
    }
}

impl fmt::Debug for UnwrapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnwrapKey(<redacted>)")
    }
}

impl Serialize for UnwrapKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for UnwrapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Derived symmetric key handed to dependent services once the account is
/// keyed. Used for both kA and kB.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SyncKey([u8; TOKEN_LENGTH]);

impl SyncKey {
    /// Creates a new `SyncKey` from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TOKEN_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the key.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }

    /// Converts the key to a hexadecimal string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creates a `SyncKey` from a hexadecimal string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid hex or not exactly 32 bytes.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for SyncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncKey(<redacted>)")
    }
}

impl Serialize for SyncKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for SyncKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// Indirection label

/// Opaque indirection key naming the secure-store entry that holds the
/// serialized account state.
///
/// Rotating the label orphans the old entry without rewriting callers'
/// references to the account record.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateLabel(String);

impl StateLabel {
    /// Wraps an existing label.
    #[must_use]
    pub const fn new(label: String) -> Self {
        Self(label)
    }

    /// Generates a fresh random label.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateLabel({})", self.0)
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Certificate and device identity

/// Short-lived signed credential proving device identity, obtained once
/// keys are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Opaque certificate string as issued by the auth service.
    pub value: String,
    /// Expiry timestamp in milliseconds since the Unix epoch.
    pub expires_at: u64,
}

impl Certificate {
    /// Creates a certificate with an explicit expiry.
    #[must_use]
    pub const fn new(value: String, expires_at: u64) -> Self {
        Self { value, expires_at }
    }

    /// Whether the certificate remains valid past `now` plus `margin_ms`.
    #[must_use]
    pub const fn is_valid_for(&self, now: u64, margin_ms: u64) -> bool {
        self.expires_at > now.saturating_add(margin_ms)
    }
}

/// Device identity minted when a certificate is first issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistration {
    /// Stable random device identifier.
    pub device_id: String,
    /// Public key the certificate was signed over.
    pub public_key: String,
}

impl DeviceRegistration {
    /// Mints a registration for a new device public key.
    #[must_use]
    pub fn mint(public_key: String) -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            public_key,
        }
    }
}
