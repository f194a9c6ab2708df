//! Runtime configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults::{
    DefaultEndpoints, DEFAULT_APP_ORIGIN, DEFAULT_CHAIN_ID, DEFAULT_SIGN_IN_STATEMENT,
    DEFAULT_STORAGE_PREFIX,
};
use crate::error::{VaultKitError, VaultKitResult};
use crate::http_request::Request;
use crate::Environment;

/// Settings shared by the session, issuance and sharing components.
///
/// Missing fields take the production defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitConfig {
    /// Base URL of the witness service.
    pub witness_url: String,
    /// Origin of the application, used for sharing links and the sign-in request.
    pub app_origin: String,
    /// Prefix applied to every key the application stores in the vault.
    pub storage_prefix: String,
    /// Domain requesting the sign-in. Defaults to the host of `app_origin`.
    pub domain: Option<String>,
    /// URI of the resource the sign-in grants access to. Defaults to `app_origin`.
    pub uri: Option<String>,
    /// Human readable statement included in the sign-in request.
    pub statement: String,
    /// Chain id of the signing account.
    pub chain_id: u64,
    /// Timeout applied to each HTTP request, in seconds.
    pub timeout_secs: u64,
    /// Retries for transient HTTP failures, excluding the first attempt.
    pub max_retries: u32,
    /// Allows plain `http` endpoints. Only meant for local services.
    pub allow_insecure_http: bool,
}

impl Default for KitConfig {
    fn default() -> Self {
        Self::from_environment(&Environment::Production)
    }
}

impl KitConfig {
    /// Defaults for `environment`.
    #[must_use]
    pub fn from_environment(environment: &Environment) -> Self {
        Self {
            witness_url: environment.witness_url().to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            domain: None,
            uri: None,
            statement: DEFAULT_SIGN_IN_STATEMENT.to_string(),
            chain_id: DEFAULT_CHAIN_ID,
            timeout_secs: 5,
            max_retries: 3,
            allow_insecure_http: matches!(environment, Environment::Local),
        }
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::InvalidInput`] if the JSON is malformed or
    /// `app_origin` is not a valid URL.
    pub fn from_json(json: &str) -> VaultKitResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| VaultKitError::InvalidInput {
                attribute: "config".to_string(),
                reason: e.to_string(),
            })?;
        config.origin_url()?;
        Ok(config)
    }

    /// The domain presented in the sign-in request.
    ///
    /// # Errors
    ///
    /// Returns an error if no domain is configured and `app_origin` has no host.
    pub fn sign_in_domain(&self) -> VaultKitResult<String> {
        if let Some(domain) = &self.domain {
            return Ok(domain.clone());
        }
        let origin = self.origin_url()?;
        let host = origin.host_str().ok_or_else(|| VaultKitError::InvalidInput {
            attribute: "app_origin".to_string(),
            reason: "origin has no host".to_string(),
        })?;
        Ok(origin
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}")))
    }

    /// The URI presented in the sign-in request.
    #[must_use]
    pub fn sign_in_uri(&self) -> String {
        self.uri.clone().unwrap_or_else(|| self.app_origin.clone())
    }

    /// The application origin without a trailing slash.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.app_origin.trim_end_matches('/')
    }

    pub(crate) fn request(&self) -> Request {
        Request::new(Duration::from_secs(self.timeout_secs), self.max_retries)
            .allow_insecure(self.allow_insecure_http)
    }

    fn origin_url(&self) -> VaultKitResult<Url> {
        Url::parse(&self.app_origin).map_err(|e| VaultKitError::InvalidInput {
            attribute: "app_origin".to_string(),
            reason: e.to_string(),
        })
    }
}
