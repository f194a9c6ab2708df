//! Vault detection and creation for a signed-in identity.

use std::sync::Arc;

use super::{VaultClient, VaultId, VaultResult};

/// Detects and provisions the vault owned by the current identity.
///
/// The provisioner holds no state of its own. `create` does not re-check
/// existence; callers are expected to call [`VaultProvisioner::exists`] first.
/// Neither operation is retried on failure.
#[derive(Clone)]
pub struct VaultProvisioner {
    client: Arc<dyn VaultClient>,
}

impl VaultProvisioner {
    /// Creates a provisioner on top of `client`.
    #[must_use]
    pub fn new(client: Arc<dyn VaultClient>) -> Self {
        Self { client }
    }

    /// The client used for provisioning calls.
    #[must_use]
    pub fn client(&self) -> Arc<dyn VaultClient> {
        Arc::clone(&self.client)
    }

    /// Returns whether `vault` has been provisioned.
    ///
    /// # Errors
    ///
    /// Returns [`super::VaultError`] on transport failure.
    pub async fn exists(&self, vault: &VaultId) -> VaultResult<bool> {
        let exists = self.client.exists(vault).await?;
        log::debug!("vault {vault} exists: {exists}");
        Ok(exists)
    }

    /// Provisions `vault`.
    ///
    /// # Errors
    ///
    /// Returns [`super::VaultError`] if the host fails to provision; the caller
    /// should offer a manual retry.
    pub async fn create(&self, vault: &VaultId) -> VaultResult<()> {
        self.client.create(vault).await?;
        log::info!("vault {vault} provisioned");
        Ok(())
    }
}
