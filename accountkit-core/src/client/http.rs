//! Auth client backed by the real HTTP service.

use async_trait::async_trait;
use reqwest::Response;
use serde::{Deserialize, Serialize};

use crate::config::AccountConfiguration;
use crate::machine::CERTIFICATE_LIFETIME_MS;
use crate::types::{KeyFetchToken, SessionToken, SyncKey, TOKEN_LENGTH};

use super::request::Request;
use super::{AuthClient, AuthError, KeyBundle, VerificationStatus};

/// Auth client that talks to an account service over HTTPS.
///
/// Tokens authorize requests as hex-encoded bearer credentials. The
/// retry layer absorbs 429/5xx and connection failures; what remains is
/// mapped onto the [`AuthError`] taxonomy here.
pub struct HttpAuthClient {
    auth_endpoint: String,
    request: Request,
}

impl HttpAuthClient {
    /// Creates a client against an explicit auth endpoint, given without
    /// a trailing slash.
    #[must_use]
    pub fn new(auth_endpoint: impl Into<String>) -> Self {
        Self {
            auth_endpoint: auth_endpoint.into(),
            request: Request::new(),
        }
    }

    /// Creates a client for a configuration's auth endpoint.
    #[must_use]
    pub fn for_configuration(configuration: &AccountConfiguration) -> Self {
        Self::new(configuration.auth_endpoint())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.auth_endpoint)
    }
}

fn bearer(token_hex: &str) -> String {
    format!("Bearer {token_hex}")
}

/// Maps remaining response statuses onto the auth error taxonomy.
fn checked(response: Response) -> Result<Response, AuthError> {
    match response.status().as_u16() {
        200..=299 => Ok(response),
        401 => Err(AuthError::CredentialRejected),
        410 => Err(AuthError::SessionInvalidated),
        status => Err(AuthError::Transient {
            reason: format!("unexpected status {status}"),
        }),
    }
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    response.json::<T>().await.map_err(|e| AuthError::Transient {
        reason: format!("invalid response body: {e}"),
    })
}

fn decode_key(hex_str: &str, field: &str) -> Result<[u8; TOKEN_LENGTH], AuthError> {
    let bytes = hex::decode(hex_str).map_err(|e| AuthError::Transient {
        reason: format!("invalid {field} encoding: {e}"),
    })?;
    bytes.try_into().map_err(|_| AuthError::Transient {
        reason: format!("invalid {field} length"),
    })
}

#[derive(Deserialize)]
struct KeysResponse {
    ka: String,
    #[serde(rename = "wrapKb")]
    wrap_kb: String,
}

#[derive(Deserialize)]
struct CertificateResponse {
    cert: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CertificateSignBody<'a> {
    public_key: &'a str,
    duration: u64,
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn check_verification(
        &self,
        session_token: &SessionToken,
    ) -> Result<VerificationStatus, AuthError> {
        let response = self
            .request
            .handle(
                self.request
                    .get(&self.url("/recovery_email/status"))
                    .header("Authorization", bearer(&session_token.to_hex())),
            )
            .await?;
        json_body(checked(response)?).await
    }

    async fn fetch_keys(&self, key_fetch_token: &KeyFetchToken) -> Result<KeyBundle, AuthError> {
        let response = self
            .request
            .handle(
                self.request
                    .post(&self.url("/account/keys"))
                    .header("Authorization", bearer(&key_fetch_token.to_hex())),
            )
            .await?;
        let body: KeysResponse = json_body(checked(response)?).await?;
        Ok(KeyBundle {
            ka: SyncKey::new(decode_key(&body.ka, "ka")?),
            wrapped_kb: decode_key(&body.wrap_kb, "wrapKb")?,
        })
    }

    async fn sign_certificate(
        &self,
        session_token: &SessionToken,
        public_key: &str,
    ) -> Result<String, AuthError> {
        let body = CertificateSignBody {
            public_key,
            duration: CERTIFICATE_LIFETIME_MS,
        };
        let response = self
            .request
            .handle(
                self.request
                    .post(&self.url("/certificate/sign"))
                    .header("Authorization", bearer(&session_token.to_hex()))
                    .json(&body),
            )
            .await?;
        let body: CertificateResponse = json_body(checked(response)?).await?;
        Ok(body.cert)
    }
}
