#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Account identity lifecycle core.
//!
//! Drives a user's authentication session from first registration
//! through email verification to a fully-keyed, usable session. The
//! [`Account`] facade owns the single current [`AccountState`]; the
//! [`LoginStateMachine`] advances it against an [`AuthClient`], and
//! every replacement is checkpointed through a [`SecureStore`] before
//! it takes effect.

mod account;
pub use account::*;

mod client;
pub use client::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod machine;
pub use machine::*;

mod state;
pub use state::*;

mod store;
pub use store::*;

mod sync_auth;
pub use sync_auth::*;

mod types;
pub use types::*;
