//! HTTP plumbing shared by the auth client.

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use super::AuthError;

/// A thin wrapper on an HTTP client for talking to the auth service.
/// Sets sensible defaults such as timeouts and user-agent, and applies
/// retry middleware for transient failures.
pub(crate) struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl Request {
    /// Initializes a new `Request` instance.
    pub(crate) fn new() -> Self {
        let client = reqwest::Client::new();
        let timeout = Duration::from_secs(10);
        let max_retries = 3; // total attempts = 4
        Self {
            client,
            timeout,
            max_retries,
        }
    }

    /// Creates a request builder with defaults applied.
    fn req(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).timeout(self.timeout).header(
            "User-Agent",
            format!("accountkit-core/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.req(Method::POST, url)
    }

    /// Sends a request built by `get`/`post`, retrying transient
    /// failures.
    ///
    /// Retries 429 and 5xx responses and connect/timeout errors with
    /// exponential backoff. Any other response is returned to the caller
    /// for status handling; the wrapper never interprets auth semantics.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, AuthError> {
        let Some(template) = request_builder.try_clone() else {
            return execute(request_builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let attempt = template.try_clone().ok_or_else(|| {
                AttemptError::permanent(
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute(attempt).await
        })
        .retry(backoff)
        .when(|err: &AttemptError| err.is_retryable())
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct AttemptError {
    message: String,
    retryable: bool,
}

impl AttemptError {
    fn retryable(message: String) -> Self {
        Self {
            message,
            retryable: true,
        }
    }

    fn permanent(message: String) -> Self {
        Self {
            message,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<AttemptError> for AuthError {
    fn from(value: AttemptError) -> Self {
        Self::Transient {
            reason: value.message,
        }
    }
}

async fn execute(request_builder: RequestBuilder) -> Result<Response, AttemptError> {
    match request_builder.send().await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                return Err(AttemptError::retryable(format!(
                    "auth service responded with status {status}"
                )));
            }
            Ok(resp)
        }
        Err(err) => {
            if err.is_timeout() || err.is_connect() {
                return Err(AttemptError::retryable(format!(
                    "request timeout/connect error: {err}"
                )));
            }

            Err(AttemptError::permanent(format!("request failed: {err}")))
        }
    }
}
