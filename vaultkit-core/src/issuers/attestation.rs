//! Content attestation issuer: statement, signature, witnessed credential.
use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::statement::{
    Content, JwtResponse, ProofRequest, Statement, StatementRequest, StatementResponse,
};
use crate::config::KitConfig;
use crate::error::{VaultKitError, VaultKitResult};
use crate::http_request::{Request, RetryPolicy};
use crate::signer::{Signer, SignerError};

/// Witness service client that turns signed statements into credentials.
///
/// Holds no state between calls. Each protocol step is sent once: a request is
/// only resent when the connection could not be established, never after the
/// service answered.
#[derive(Debug, Clone)]
pub struct AttestationIssuer {
    base_url: String,
    request: Request,
}

impl AttestationIssuer {
    /// Creates an issuer for the witness service named in `config`.
    #[must_use]
    pub fn new(config: &KitConfig) -> Self {
        Self {
            base_url: config.witness_url.trim_end_matches('/').to_string(),
            request: config.request().with_retry_policy(RetryPolicy::Unsent),
        }
    }

    /// Requests the text to sign for `content` attested by `address`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::Statement`] if the response carries no
    /// statement, or a network error if the service cannot be reached.
    pub async fn statement(&self, content: &Content, address: &str) -> VaultKitResult<String> {
        let request = StatementRequest::basic_post(Statement::new(content, address));
        let response: StatementResponse = self
            .post_json("/statement", &request)
            .await?
            .map_err(|e| VaultKitError::Statement(format!("malformed statement response: {e}")))?;

        response
            .statement
            .filter(|statement| !statement.is_empty())
            .ok_or_else(|| {
                VaultKitError::Statement(describe_missing("statement", response.error.as_ref()))
            })
    }

    /// Submits `signature` over the statement for `content` and returns the credential token.
    ///
    /// The statement structure is rebuilt from `(content, address)`, which
    /// yields the exact structure submitted in the statement phase.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::Witness`] if the response carries no token, or
    /// a network error if the service cannot be reached.
    pub async fn witness(
        &self,
        content: &Content,
        address: &str,
        signature: String,
    ) -> VaultKitResult<String> {
        let request = ProofRequest::basic_post(Statement::new(content, address), signature);
        let response: JwtResponse = self
            .post_json("/witness_jwt", &request)
            .await?
            .map_err(|e| VaultKitError::Witness(format!("malformed witness response: {e}")))?;

        response
            .jwt
            .filter(|jwt| !jwt.is_empty())
            .ok_or_else(|| VaultKitError::Witness(describe_missing("jwt", response.error.as_ref())))
    }

    /// Issues a credential for `content`: fetches the statement, has `sign`
    /// sign exactly that text, and witnesses the signature.
    ///
    /// # Errors
    ///
    /// Fails fast with the first error raised by any of the three steps.
    pub async fn issue<F, Fut>(
        &self,
        content: &Content,
        address: &str,
        sign: F,
    ) -> VaultKitResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<String, SignerError>>,
    {
        let statement = self.statement(content, address).await?;
        let signature = sign(statement).await?;
        let jwt = self.witness(content, address, signature).await?;
        log::info!("issued attestation credential for {address}");
        Ok(jwt)
    }

    /// [`AttestationIssuer::issue`] using `signer` for both the address and the signature.
    ///
    /// # Errors
    ///
    /// See [`AttestationIssuer::issue`].
    pub async fn issue_with_signer(
        &self,
        content: &Content,
        signer: &dyn Signer,
    ) -> VaultKitResult<String> {
        let address = signer.address();
        self.issue(content, &address, |statement| async move {
            signer.sign_message(&statement).await
        })
        .await
    }

    /// Posts `body` to `path` and decodes a successful JSON response.
    ///
    /// The outer result carries transport failures, the inner one decoding failures.
    async fn post_json<B, R>(
        &self,
        path: &str,
        body: &B,
    ) -> VaultKitResult<Result<R, serde_json::Error>>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let builder = self.request.post(&url)?.json(body);
        let response = self.request.handle(builder).await?;

        let status = response.status();
        if !status.is_success() {
            let error = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("Unknown error"));
            return Err(VaultKitError::NetworkError {
                url,
                status: Some(status.as_u16()),
                error,
            });
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text))
    }
}

fn describe_missing(field: &str, error: Option<&serde_json::Value>) -> String {
    error.map_or_else(
        || format!("no {field} found in witness response"),
        |error| format!("no {field} found in witness response: {error}"),
    )
}

#[cfg(test)]
impl AttestationIssuer {
    /// Create an issuer with a custom base URL (for testing).
    #[must_use]
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            request: Request::new(std::time::Duration::from_secs(5), 0)
                .allow_insecure(true)
                .with_retry_policy(RetryPolicy::Unsent),
        }
    }
}
