//! Errors surfaced by the account facade.

use thiserror::Error;

use crate::store::StoreError;

/// Failure surfaced to callers of the account facade.
///
/// Credential verdicts from the auth service are not represented here:
/// the state machine absorbs them by collapsing the state backward, so
/// callers observe a `Separated` or `Doghouse` state rather than an
/// error.
#[derive(Debug, Error)]
pub enum AccountError {
    /// A persisted record or state blob failed to deserialize.
    #[error("parse_failure: {context}")]
    Parse {
        /// Description of what failed to parse.
        context: String,
    },
    /// A persisted record carries an unsupported schema version.
    #[error("schema_version_mismatch: found version {found}")]
    SchemaVersion {
        /// The version found in the record.
        found: u32,
    },
    /// Network or server hiccup. The account state is unchanged and the
    /// caller may retry later.
    #[error("transient: {reason}")]
    Transient {
        /// Description of the failure.
        reason: String,
    },
    /// The machine could not reach `Married` for a caller that required
    /// a fully-keyed session.
    #[error("not_married")]
    NotMarried,
    /// The secure store failed while persisting or removing state.
    #[error("store_failure: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccountError::Parse {
            context: "bad blob".to_string(),
        };
        assert_eq!(err.to_string(), "parse_failure: bad blob");

        let err = AccountError::SchemaVersion { found: 2 };
        assert_eq!(err.to_string(), "schema_version_mismatch: found version 2");

        assert_eq!(AccountError::NotMarried.to_string(), "not_married");
    }

    #[test]
    fn test_store_error_converts() {
        let err: AccountError = StoreError::new("disk full").into();
        assert_eq!(err.to_string(), "store_failure: disk full");
    }
}
