//! Application secrets kept in the user's vault.
//!
//! A value read back from the vault is not trusted until a [`SecretProbe`] has
//! confirmed that the service consuming it still accepts it.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::KitConfig;
use crate::defaults::DEFAULT_PROBE_URL;
use crate::error::{VaultKitError, VaultKitResult};
use crate::http_request::Request;
use crate::vault::{VaultHandle, VaultId};

/// Checks that a secret is still accepted by the service that consumes it.
#[async_trait]
pub trait SecretProbe: Send + Sync {
    /// Verifies `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::SecretValidation`] if the service rejects the
    /// secret, or a network error if it cannot be reached.
    async fn verify(&self, secret: &SecretString) -> VaultKitResult<()>;
}

/// Probe issuing an authenticated `GET` with the secret as bearer token.
#[derive(Debug, Clone)]
pub struct HttpBearerProbe {
    url: String,
    request: Request,
}

impl HttpBearerProbe {
    /// Probe against `url`.
    #[must_use]
    pub fn new(url: impl Into<String>, config: &KitConfig) -> Self {
        Self {
            url: url.into(),
            request: config.request(),
        }
    }

    /// Probe against the model listing endpoint of the default API.
    #[must_use]
    pub fn models(config: &KitConfig) -> Self {
        Self::new(DEFAULT_PROBE_URL, config)
    }
}

#[async_trait]
impl SecretProbe for HttpBearerProbe {
    async fn verify(&self, secret: &SecretString) -> VaultKitResult<()> {
        let builder = self
            .request
            .get(&self.url)?
            .bearer_auth(secret.expose_secret());
        let response = self.request.handle(builder).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(VaultKitError::SecretValidation(format!(
            "{} answered with status {}",
            self.url,
            status.as_u16()
        )))
    }
}

/// What [`SecretStore::load_verified`] found.
#[derive(Debug)]
pub enum SecretStatus {
    /// A stored secret that the probe accepted.
    Verified(SecretString),
    /// Nothing is stored; the user has to enter a value.
    Missing,
    /// A secret is stored but the probe rejected it; the user has to enter a new value.
    Invalid,
}

/// Vault-scoped accessor for named secrets.
#[derive(Debug, Clone)]
pub struct SecretStore {
    handle: VaultHandle,
}

impl SecretStore {
    /// Store reading and writing through `handle`.
    #[must_use]
    pub const fn new(handle: VaultHandle) -> Self {
        Self { handle }
    }

    /// The vault the secrets live in.
    #[must_use]
    pub const fn vault_id(&self) -> &VaultId {
        self.handle.id()
    }

    /// Reads the secret stored as `name`. The value is not verified.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault read fails.
    pub async fn get(&self, name: &str) -> VaultKitResult<Option<SecretString>> {
        let entry = self.handle.get(name).await?;
        Ok(entry.map(|entry| SecretString::from(entry.data)))
    }

    /// Stores `value` as `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault write fails.
    pub async fn put(&self, name: &str, value: &SecretString) -> VaultKitResult<()> {
        self.handle.put(name, value.expose_secret()).await?;
        Ok(())
    }

    /// Reads `name` and checks it with `probe`.
    ///
    /// A probe failure of any kind yields [`SecretStatus::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the vault read fails.
    pub async fn load_verified(
        &self,
        name: &str,
        probe: &dyn SecretProbe,
    ) -> VaultKitResult<SecretStatus> {
        let Some(secret) = self.get(name).await? else {
            return Ok(SecretStatus::Missing);
        };
        match probe.verify(&secret).await {
            Ok(()) => Ok(SecretStatus::Verified(secret)),
            Err(e) => {
                log::warn!("stored secret {name} failed verification: {e}");
                Ok(SecretStatus::Invalid)
            }
        }
    }

    /// Verifies `value` with `probe` and stores it as `name` only if accepted.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::InvalidInput`] for a blank value, the probe's
    /// error if verification fails, or an error if the vault write fails.
    pub async fn submit(
        &self,
        name: &str,
        value: SecretString,
        probe: &dyn SecretProbe,
    ) -> VaultKitResult<SecretString> {
        if value.expose_secret().trim().is_empty() {
            return Err(VaultKitError::InvalidInput {
                attribute: name.to_string(),
                reason: "value is empty".to_string(),
            });
        }
        probe.verify(&value).await?;
        self.put(name, &value).await?;
        Ok(value)
    }
}
