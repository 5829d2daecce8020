//! Account lifecycle states and their serialized document form.
//!
//! The lifecycle is forward-progressing: `advance` only ever moves a
//! session toward `Married`, and failures collapse backward to
//! `Separated` or `Doghouse`. Each state serializes to a JSON document
//! carrying a `state-label` discriminator plus its payload fields.

use serde::{Deserialize, Serialize};

use crate::error::AccountError;
use crate::types::{
    Certificate, DeviceRegistration, KeyFetchToken, SessionToken, SyncKey, UnwrapKey,
};

/// Payload of [`AccountState::EngagedBeforeVerified`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagedBeforeVerified {
    /// Session token from the login exchange.
    pub session_token: SessionToken,
    /// One-time token for the key bundle fetch once verified.
    pub key_fetch_token: KeyFetchToken,
    /// Local unwrap key for the fetched bundle.
    pub unwrap_key: UnwrapKey,
    /// When the unverified session was first observed, in milliseconds
    /// since the Unix epoch.
    pub first_seen_at: u64,
    /// When the user was last prompted to verify, in milliseconds since
    /// the Unix epoch.
    pub last_notified_at: u64,
}

/// Payload of [`AccountState::EngagedAfterVerified`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagedAfterVerified {
    /// Session token from the login exchange.
    pub session_token: SessionToken,
    /// One-time token for the key bundle fetch.
    pub key_fetch_token: KeyFetchToken,
    /// Local unwrap key for the fetched bundle.
    pub unwrap_key: UnwrapKey,
}

/// Payload of [`AccountState::Cohabiting`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohabiting {
    /// Session token from the login exchange.
    pub session_token: SessionToken,
    /// First derived sync key.
    pub ka: SyncKey,
    /// Second derived sync key, unwrapped locally.
    pub kb: SyncKey,
}

/// Payload of [`AccountState::Married`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Married {
    /// Session token from the login exchange.
    pub session_token: SessionToken,
    /// First derived sync key.
    pub ka: SyncKey,
    /// Second derived sync key, unwrapped locally.
    pub kb: SyncKey,
    /// Current device certificate.
    pub certificate: Certificate,
    /// Device identity the certificate is bound to.
    pub device_registration: DeviceRegistration,
}

/// Payload of [`AccountState::Doghouse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doghouse {
    /// Session token the service invalidated. Retained so re-auth flows
    /// can identify the dead session.
    pub session_token: SessionToken,
}

/// The set of account lifecycle states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state-label", rename_all = "camelCase")]
pub enum AccountState {
    /// No valid session; re-authentication must supply fresh credentials.
    Separated,
    /// Logged in, email not yet verified.
    EngagedBeforeVerified(EngagedBeforeVerified),
    /// Verified but keys not yet fetched.
    EngagedAfterVerified(EngagedAfterVerified),
    /// Keys fetched and derived; certificate not yet obtained.
    Cohabiting(Cohabiting),
    /// Fully usable authenticated session.
    Married(Married),
    /// Session invalidated by the service; needs re-auth without
    /// discarding the account identity.
    Doghouse(Doghouse),
}

impl AccountState {
    /// Returns the wire discriminator for this state.
    ///
    /// Labels are not sensitive and are safe to log.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Separated => "separated",
            Self::EngagedBeforeVerified(_) => "engagedBeforeVerified",
            Self::EngagedAfterVerified(_) => "engagedAfterVerified",
            Self::Cohabiting(_) => "cohabiting",
            Self::Married(_) => "married",
            Self::Doghouse(_) => "doghouse",
        }
    }

    /// Serializes the state to its JSON document form.
    ///
    /// # Errors
    /// Returns [`AccountError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, AccountError> {
        serde_json::to_string(self).map_err(|e| AccountError::Parse {
            context: format!("state serialization failed: {e}"),
        })
    }

    /// Parses a state from its JSON document form.
    ///
    /// An unknown discriminator or a malformed payload is a typed parse
    /// failure, never a panic and never a partial state.
    ///
    /// # Errors
    /// Returns [`AccountError::Parse`] when the document is not a valid
    /// state.
    pub fn from_json(json: &str) -> Result<Self, AccountError> {
        serde_json::from_str(json).map_err(|e| AccountError::Parse {
            context: format!("state parse failed: {e}"),
        })
    }

    /// The user-facing action required to make progress from this state.
    #[must_use]
    pub const fn action_needed(&self) -> ActionNeeded {
        match self {
            Self::Separated => ActionNeeded::NeedsPassword,
            Self::EngagedBeforeVerified(_) => ActionNeeded::NeedsVerification,
            Self::EngagedAfterVerified(_) | Self::Cohabiting(_) | Self::Married(_) => {
                ActionNeeded::None
            }
            Self::Doghouse(_) => ActionNeeded::NeedsUpgrade,
        }
    }
}

/// What a user must do before the session can progress further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionNeeded {
    /// Session is usable or progressing on its own.
    None,
    /// The user must verify their email address.
    NeedsVerification,
    /// The user must re-enter their password.
    NeedsPassword,
    /// The session must be re-established through a fresh login.
    NeedsUpgrade,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TOKEN_LENGTH;

    fn engaged_before_verified() -> AccountState {
        AccountState::EngagedBeforeVerified(EngagedBeforeVerified {
            session_token: SessionToken::new([1; TOKEN_LENGTH]),
            key_fetch_token: KeyFetchToken::new([2; TOKEN_LENGTH]),
            unwrap_key: UnwrapKey::new([3; TOKEN_LENGTH]),
            first_seen_at: 1_000,
            last_notified_at: 1_000,
        })
    }

    fn married() -> AccountState {
        AccountState::Married(Married {
            session_token: SessionToken::new([1; TOKEN_LENGTH]),
            ka: SyncKey::new([4; TOKEN_LENGTH]),
            kb: SyncKey::new([5; TOKEN_LENGTH]),
            certificate: Certificate::new("cert-value".to_string(), 99_000),
            device_registration: DeviceRegistration {
                device_id: "device-1".to_string(),
                public_key: "pk".to_string(),
            },
        })
    }

    #[test]
    fn test_separated_round_trip() {
        let json = AccountState::Separated.to_json().unwrap();
        assert_eq!(json, r#"{"state-label":"separated"}"#);
        assert_eq!(
            AccountState::from_json(&json).unwrap(),
            AccountState::Separated
        );
    }

    #[test]
    fn test_engaged_round_trip_preserves_payload() {
        let state = engaged_before_verified();
        let json = state.to_json().unwrap();
        assert!(json.contains(r#""state-label":"engagedBeforeVerified""#));
        assert!(json.contains(r#""firstSeenAt":1000"#));
        assert_eq!(AccountState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_married_round_trip_preserves_payload() {
        let state = married();
        let json = state.to_json().unwrap();
        assert!(json.contains(r#""state-label":"married""#));
        assert!(json.contains(r#""deviceId":"device-1""#));
        assert_eq!(AccountState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_tokens_serialize_as_hex() {
        let json = engaged_before_verified().to_json().unwrap();
        assert!(json.contains(&"01".repeat(TOKEN_LENGTH)));
        assert!(json.contains(&"02".repeat(TOKEN_LENGTH)));
    }

    #[test]
    fn test_unknown_discriminator_is_a_parse_failure() {
        let err = AccountState::from_json(r#"{"state-label":"divorced"}"#).unwrap_err();
        assert!(matches!(err, AccountError::Parse { .. }));
    }

    #[test]
    fn test_malformed_payload_is_a_parse_failure() {
        let err =
            AccountState::from_json(r#"{"state-label":"cohabiting","ka":"too-short"}"#).unwrap_err();
        assert!(matches!(err, AccountError::Parse { .. }));

        let err = AccountState::from_json("not json").unwrap_err();
        assert!(matches!(err, AccountError::Parse { .. }));
    }

    #[test]
    fn test_labels_match_wire_discriminators() {
        assert_eq!(AccountState::Separated.label(), "separated");
        assert_eq!(engaged_before_verified().label(), "engagedBeforeVerified");
        assert_eq!(married().label(), "married");
    }

    #[test]
    fn test_action_needed_mapping() {
        assert_eq!(
            AccountState::Separated.action_needed(),
            ActionNeeded::NeedsPassword
        );
        assert_eq!(
            engaged_before_verified().action_needed(),
            ActionNeeded::NeedsVerification
        );
        assert_eq!(married().action_needed(), ActionNeeded::None);
        let doghouse = AccountState::Doghouse(Doghouse {
            session_token: SessionToken::new([9; TOKEN_LENGTH]),
        });
        assert_eq!(doghouse.action_needed(), ActionNeeded::NeedsUpgrade);
    }
}
