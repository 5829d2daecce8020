//! Account facade tying the state machine to persistence.
//!
//! The facade owns exactly one current state. Every state replacement
//! is written through the secure store before the in-memory value is
//! swapped, so a crash can never resurrect a stale prior state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::client::{AuthClient, LoginResponse};
use crate::config::{AccountConfiguration, ConfigurationLabel};
use crate::error::AccountError;
use crate::machine::LoginStateMachine;
use crate::state::{AccountState, ActionNeeded, EngagedAfterVerified, EngagedBeforeVerified, Married};
use crate::store::{state_key, SecureStore};
use crate::sync_auth::SyncAuthContext;
use crate::types::{StateLabel, UnwrapKey};

/// Schema version written into the non-sensitive record.
pub const RECORD_SCHEMA_VERSION: u32 = 1;

/// Non-sensitive persisted form of an account.
///
/// Never contains tokens or keys; the state is re-resolved through the
/// secure store via `state_key_label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Record schema version. Loading rejects unknown versions.
    pub version: u32,
    /// Email address of the account.
    pub email: String,
    /// Stable account identifier.
    pub uid: String,
    /// Label of the service deployment the account is bound to.
    pub configuration_label: ConfigurationLabel,
    /// Indirection key under which the sensitive state is stored.
    pub state_key_label: StateLabel,
}

impl AccountRecord {
    /// Serializes the record to JSON.
    ///
    /// # Errors
    /// Fails with [`AccountError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, AccountError> {
        serde_json::to_string(self).map_err(|e| AccountError::Parse {
            context: format!("record serialization failed: {e}"),
        })
    }

    /// Deserializes a record from JSON.
    ///
    /// # Errors
    /// Fails with [`AccountError::Parse`] on malformed JSON or an
    /// unknown configuration label.
    pub fn from_json(raw: &str) -> Result<Self, AccountError> {
        serde_json::from_str(raw).map_err(|e| AccountError::Parse {
            context: format!("record deserialization failed: {e}"),
        })
    }
}

/// A user's account identity plus its single current login state.
pub struct Account {
    configuration: AccountConfiguration,
    email: String,
    uid: String,
    state_key_label: StateLabel,
    state: RwLock<AccountState>,
    advance_gate: tokio::sync::Mutex<()>,
    store: Arc<dyn SecureStore>,
}

impl Account {
    /// Constructs an account and immediately checkpoints its state.
    ///
    /// # Errors
    /// Fails with [`AccountError::Store`] if the initial checkpoint
    /// cannot be written.
    pub fn new(
        configuration: AccountConfiguration,
        email: impl Into<String>,
        uid: impl Into<String>,
        state_key_label: StateLabel,
        state: AccountState,
        store: Arc<dyn SecureStore>,
    ) -> Result<Self, AccountError> {
        let account = Self {
            configuration,
            email: email.into(),
            uid: uid.into(),
            state_key_label,
            state: RwLock::new(state),
            advance_gate: tokio::sync::Mutex::new(()),
            store,
        };
        account.checkpoint()?;
        Ok(account)
    }

    /// Seeds an account from a successful login or registration
    /// exchange.
    ///
    /// Starts in `EngagedBeforeVerified` when the service reports the
    /// email unverified, else `EngagedAfterVerified`. A fresh state key
    /// label is generated.
    ///
    /// # Errors
    /// Fails with [`AccountError::Store`] if the initial checkpoint
    /// cannot be written.
    pub fn from_login_response(
        configuration: AccountConfiguration,
        response: LoginResponse,
        unwrap_key: UnwrapKey,
        now: u64,
        store: Arc<dyn SecureStore>,
    ) -> Result<Self, AccountError> {
        let state = if response.verified {
            AccountState::EngagedAfterVerified(EngagedAfterVerified {
                session_token: response.session_token,
                key_fetch_token: response.key_fetch_token,
                unwrap_key,
            })
        } else {
            AccountState::EngagedBeforeVerified(EngagedBeforeVerified {
                session_token: response.session_token,
                key_fetch_token: response.key_fetch_token,
                unwrap_key,
                first_seen_at: now,
                last_notified_at: now,
            })
        };
        Self::new(
            configuration,
            response.email,
            response.uid,
            StateLabel::generate(),
            state,
            store,
        )
    }

    /// Converts the account to its non-sensitive persisted record.
    #[must_use]
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            version: RECORD_SCHEMA_VERSION,
            email: self.email.clone(),
            uid: self.uid.clone(),
            configuration_label: self.configuration.label(),
            state_key_label: self.state_key_label.clone(),
        }
    }

    /// Rehydrates an account from its record, resolving the sensitive
    /// state through the secure store.
    ///
    /// A store miss or an unparseable state blob is not an error: the
    /// account falls back to `Separated` under a freshly generated
    /// label, preserving the identity.
    ///
    /// # Errors
    /// Fails with [`AccountError::SchemaVersion`] on an unsupported
    /// record version and [`AccountError::Store`] if the fallback
    /// checkpoint cannot be written.
    pub fn from_record(
        record: AccountRecord,
        store: Arc<dyn SecureStore>,
    ) -> Result<Self, AccountError> {
        if record.version != RECORD_SCHEMA_VERSION {
            return Err(AccountError::SchemaVersion {
                found: record.version,
            });
        }
        let configuration = AccountConfiguration::from_label(record.configuration_label);
        let (label, state) = match Self::resolve_state(&record.state_key_label, store.as_ref()) {
            Some(state) => (record.state_key_label, state),
            None => {
                tracing::warn!(
                    uid = record.uid,
                    "stored state missing or unreadable, separating under a fresh label"
                );
                // best effort
                let _ = store.remove(&state_key(&record.state_key_label));
                (StateLabel::generate(), AccountState::Separated)
            }
        };
        Self::new(configuration, record.email, record.uid, label, state, store)
    }

    fn resolve_state(label: &StateLabel, store: &dyn SecureStore) -> Option<AccountState> {
        let blob = store.get(&state_key(label)).ok().flatten()?;
        let raw = String::from_utf8(blob).ok()?;
        AccountState::from_json(&raw).ok()
    }

    /// Serializes the current state and writes it through the store.
    ///
    /// # Errors
    /// Fails with [`AccountError::Store`] if the write fails.
    pub fn checkpoint(&self) -> Result<(), AccountError> {
        let state = self.current_state();
        self.persist(&state)
    }

    fn persist(&self, state: &AccountState) -> Result<(), AccountError> {
        let json = state.to_json()?;
        self.store
            .set(&state_key(&self.state_key_label), json.as_bytes())?;
        Ok(())
    }

    /// Drives the state machine forward and returns the new state.
    ///
    /// Concurrent callers queue behind the in-flight advance; the
    /// replacement is checkpointed before the in-memory state is
    /// swapped.
    ///
    /// # Errors
    /// Fails with [`AccountError::Transient`] when a network hiccup
    /// prevented any progress and [`AccountError::Store`] if the
    /// checkpoint fails, leaving the prior state in place.
    pub async fn advance<C: AuthClient>(
        &self,
        client: &C,
        now: u64,
    ) -> Result<AccountState, AccountError> {
        let _gate = self.advance_gate.lock().await;
        let current = self.current_state();
        let machine = LoginStateMachine::new(client);
        let next = machine.advance(current.clone(), now).await?;
        if next != current {
            self.persist(&next)?;
            *self
                .state
                .write()
                .unwrap_or_else(PoisonError::into_inner) = next.clone();
        }
        Ok(next)
    }

    /// Advances the machine and requires the result to be `Married`.
    ///
    /// This is the path by which sync code obtains usable keys; it never
    /// reads a stale state without first driving the machine forward.
    ///
    /// # Errors
    /// Fails with [`AccountError::NotMarried`] when the machine stops
    /// short of `Married`, or with any error `advance` surfaces.
    pub async fn require_married<C: AuthClient>(
        &self,
        client: &C,
        now: u64,
    ) -> Result<Married, AccountError> {
        match self.advance(client, now).await? {
            AccountState::Married(married) => Ok(married),
            _ => Err(AccountError::NotMarried),
        }
    }

    /// Derives the token-server authorization context for this account.
    #[must_use]
    pub fn sync_auth_context(&self) -> SyncAuthContext {
        SyncAuthContext::new(
            self.email.clone(),
            self.uid.clone(),
            self.configuration.token_server_endpoint().to_string(),
        )
    }

    /// Destroys the persisted state blob and separates the account.
    ///
    /// The identity (email/uid) survives; only secrets are discarded.
    ///
    /// # Errors
    /// Fails with [`AccountError::Store`] if the removal fails.
    pub fn sign_out(&self) -> Result<(), AccountError> {
        self.store.remove(&state_key(&self.state_key_label))?;
        *self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = AccountState::Separated;
        Ok(())
    }

    /// Returns the action the user must take to make progress.
    #[must_use]
    pub fn action_needed(&self) -> ActionNeeded {
        self.current_state().action_needed()
    }

    /// Returns a clone of the current state.
    #[must_use]
    pub fn current_state(&self) -> AccountState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Email address of the account.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Stable account identifier.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Service configuration the account is bound to.
    #[must_use]
    pub const fn configuration(&self) -> &AccountConfiguration {
        &self.configuration
    }

    /// Indirection key under which the sensitive state is stored.
    #[must_use]
    pub const fn state_key_label(&self) -> &StateLabel {
        &self.state_key_label
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("uid", &self.uid)
            .field("configuration", &self.configuration.label())
            .field("state", &self.current_state().label())
            .finish_non_exhaustive()
    }
}
