use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, RequestBuilder, Response};

use crate::error::VaultKitError;

/// Which failures [`Request::handle`] retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Connect errors, timeouts, 429 and 5xx responses.
    Transient,
    /// Only connect errors, where the request never reached the server. Any
    /// answer, including a 5xx, is returned to the caller as is.
    Unsent,
}

/// A simple wrapper on an HTTP client for making requests. Sets sensible defaults such as timeouts,
/// user-agent & ensuring HTTPS, and applies retry middleware for transient failures
/// according to its [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Request {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    retry: RetryPolicy,
    https_only: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 3)
    }
}

impl Request {
    /// Initializes a new `Request` instance. `max_retries` excludes the first attempt.
    pub(crate) fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries,
            retry: RetryPolicy::Transient,
            https_only: true,
        }
    }

    /// Restricts which failures are retried. Non-idempotent calls use [`RetryPolicy::Unsent`].
    #[must_use]
    pub(crate) const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Allows plain `http` URLs, for local services and tests.
    #[must_use]
    pub(crate) const fn allow_insecure(mut self, allow: bool) -> Self {
        self.https_only = !allow;
        self
    }

    /// Creates a request builder with defaults applied.
    pub(crate) fn req(&self, method: Method, url: &str) -> Result<RequestBuilder, VaultKitError> {
        if self.https_only && !url.starts_with("https") {
            return Err(VaultKitError::InvalidInput {
                attribute: "url".to_string(),
                reason: format!("refusing non-https url {url}"),
            });
        }

        Ok(self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(
                "User-Agent",
                format!("vaultkit-core/{}", env!("CARGO_PKG_VERSION")),
            ))
    }

    /// Creates a GET request builder with defaults applied.
    pub(crate) fn get(&self, url: &str) -> Result<RequestBuilder, VaultKitError> {
        self.req(Method::GET, url)
    }

    /// Creates a POST request builder with defaults applied.
    pub(crate) fn post(&self, url: &str) -> Result<RequestBuilder, VaultKitError> {
        self.req(Method::POST, url)
    }

    /// Handles sending a request built by `req`/`get`/`post`, retrying the
    /// failures allowed by the retry policy.
    pub(crate) async fn handle(
        &self,
        request_builder: RequestBuilder,
    ) -> Result<Response, VaultKitError> {
        let Some(template) = request_builder.try_clone() else {
            return execute_request_builder(request_builder, self.retry)
                .await
                .map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        (|| async {
            let request_builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".to_string(),
                    None,
                    "request cannot be retried because it is not cloneable".to_string(),
                )
            })?;
            execute_request_builder(request_builder, self.retry).await
        })
        .retry(backoff)
        .when(RequestHandleError::is_retryable)
        .notify(|err, delay| {
            log::debug!("retrying {} in {delay:?}: {}", err.url, err.error);
        })
        .await
        .map_err(Into::into)
    }
}

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    error: String,
    retryable: bool,
}

impl RequestHandleError {
    const fn retryable(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: true,
        }
    }

    const fn permanent(url: String, status: Option<u16>, error: String) -> Self {
        Self {
            url,
            status,
            error,
            retryable: false,
        }
    }

    const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<RequestHandleError> for VaultKitError {
    fn from(value: RequestHandleError) -> Self {
        Self::NetworkError {
            url: value.url,
            status: value.status,
            error: value.error,
        }
    }
}

async fn execute_request_builder(
    request_builder: RequestBuilder,
    retry: RetryPolicy,
) -> Result<Response, RequestHandleError> {
    let (client, request) = request_builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if retry == RetryPolicy::Transient && (status == 429 || (500..600).contains(&status)) {
                return Err(RequestHandleError::retryable(
                    url,
                    Some(status),
                    format!("request error with bad status code {status}"),
                ));
            }
            Ok(resp)
        }
        Err(err) => {
            let retryable = match retry {
                RetryPolicy::Transient => err.is_timeout() || err.is_connect(),
                RetryPolicy::Unsent => err.is_connect(),
            };
            if retryable {
                return Err(RequestHandleError::retryable(
                    url,
                    None,
                    format!("request timeout/connect error: {err}"),
                ));
            }

            Err(RequestHandleError::permanent(
                url,
                None,
                format!("request failed: {err}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn fast_request() -> Request {
        Request::new(Duration::from_secs(2), 2).allow_insecure(true)
    }

    #[test]
    fn test_rejects_plain_http_by_default() {
        let request = Request::default();
        let err = assert_err!(request.get("http://example.com"));
        assert!(matches!(err, VaultKitError::InvalidInput { .. }));
        let _builder = assert_ok!(request.get("https://example.com"));
        let insecure = request.clone().allow_insecure(true);
        let _builder = assert_ok!(insecure.get("http://localhost:8787"));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let request = fast_request();
        let builder = request.get(&format!("{}/flaky", server.url())).unwrap();
        let err = request.handle(builder).await.unwrap_err();

        mock.assert_async().await;
        match err {
            VaultKitError::NetworkError { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("expected NetworkError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsent_policy_returns_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/witness")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let request = fast_request().with_retry_policy(RetryPolicy::Unsent);
        let builder = request.post(&format!("{}/witness", server.url())).unwrap();
        let response = request.handle(builder).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status().as_u16(), 503);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let request = fast_request();
        let builder = request.get(&format!("{}/missing", server.url())).unwrap();
        let response = request.handle(builder).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status().as_u16(), 404);
    }
}
