//! Service configurations the account can be bound to.
//!
//! The non-sensitive record persists a configuration label rather than
//! raw URLs; the endpoints for each label are fixed here.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifies a known deployment of the account service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConfigurationLabel {
    /// The production deployment.
    Production,
    /// The staging deployment.
    Stage,
    /// The rolling development deployment.
    LatestDev,
}

/// Immutable endpoints of a known account service deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfiguration {
    label: ConfigurationLabel,
    auth_endpoint: String,
    token_server_endpoint: String,
}

impl AccountConfiguration {
    /// Returns the configuration for a known deployment label.
    #[must_use]
    pub fn from_label(label: ConfigurationLabel) -> Self {
        let (auth_endpoint, token_server_endpoint) = match label {
            ConfigurationLabel::Production => (
                "https://api.accounts.firefox.com/v1",
                "https://token.services.mozilla.com/1.0/sync/1.5",
            ),
            ConfigurationLabel::Stage => (
                "https://api-accounts.stage.mozaws.net/v1",
                "https://token.stage.mozaws.net/1.0/sync/1.5",
            ),
            ConfigurationLabel::LatestDev => (
                "https://latest.dev.lcip.org/auth/v1",
                "https://latest.dev.lcip.org/syncserver/token/1.0/sync/1.5",
            ),
        };
        Self {
            label,
            auth_endpoint: auth_endpoint.to_string(),
            token_server_endpoint: token_server_endpoint.to_string(),
        }
    }

    /// Returns the deployment label this configuration was built from.
    #[must_use]
    pub const fn label(&self) -> ConfigurationLabel {
        self.label
    }

    /// Returns the auth service endpoint, without a trailing slash.
    #[must_use]
    pub fn auth_endpoint(&self) -> &str {
        &self.auth_endpoint
    }

    /// Returns the token server endpoint, without a trailing slash.
    #[must_use]
    pub fn token_server_endpoint(&self) -> &str {
        &self.token_server_endpoint
    }
}
