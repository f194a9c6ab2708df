//! Per-identity encrypted key-value vault.
//!
//! The storage host is reached through the [`VaultClient`] capability. Every
//! identity owns exactly one vault, addressed by a [`VaultId`] derived from the
//! signer address. Components that read or write application data hold a
//! [`VaultHandle`], which scopes a client to one vault and one key prefix.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod error;
pub mod memory;
mod provisioning;

pub use error::{VaultError, VaultResult};
pub use memory::MemoryVault;
pub use provisioning::VaultProvisioner;

/// Identifier of a vault, derived from the owning address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VaultId(String);

impl VaultId {
    /// Derives the vault identifier owned by `address` on `chain_id`.
    ///
    /// The address is lowercased so that checksummed and plain spellings of
    /// the same account resolve to the same vault.
    #[must_use]
    pub fn for_address(address: &str, chain_id: u64) -> Self {
        Self(format!(
            "kepler:pkh:eip155:{chain_id}:{}://default",
            address.to_lowercase()
        ))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value read from the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultEntry {
    /// The stored value.
    pub data: String,
}

/// Storage host interface for per-identity vaults.
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Returns whether `vault` has been provisioned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage host cannot be reached.
    async fn exists(&self, vault: &VaultId) -> VaultResult<bool>;

    /// Provisions `vault`.
    ///
    /// # Errors
    ///
    /// Returns an error if provisioning fails.
    async fn create(&self, vault: &VaultId) -> VaultResult<()>;

    /// Reads the value stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    async fn get(&self, vault: &VaultId, key: &str) -> VaultResult<Option<VaultEntry>>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn put(&self, vault: &VaultId, key: &str, value: &str) -> VaultResult<()>;

    /// Removes the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn delete(&self, vault: &VaultId, key: &str) -> VaultResult<()>;

    /// Produces an opaque, base64 encoded reference to the object at `key` that
    /// another party can resolve.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or the host refuses.
    async fn share(&self, vault: &VaultId, key: &str) -> VaultResult<String>;
}

/// A [`VaultClient`] scoped to one vault and one key prefix.
#[derive(Clone)]
pub struct VaultHandle {
    id: VaultId,
    client: Arc<dyn VaultClient>,
    prefix: String,
}

impl fmt::Debug for VaultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultHandle")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl VaultHandle {
    /// Scopes `client` to `id`, storing every key under `prefix/`.
    #[must_use]
    pub fn new(id: VaultId, client: Arc<dyn VaultClient>, prefix: impl Into<String>) -> Self {
        Self {
            id,
            client,
            prefix: prefix.into(),
        }
    }

    /// The vault this handle reads and writes.
    #[must_use]
    pub const fn id(&self) -> &VaultId {
        &self.id
    }

    /// Full storage key for an application key.
    #[must_use]
    pub fn scoped_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{key}", self.prefix)
        }
    }

    /// Reads `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn get(&self, key: &str) -> VaultResult<Option<VaultEntry>> {
        self.client.get(&self.id, &self.scoped_key(key)).await
    }

    /// Writes `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn put(&self, key: &str, value: &str) -> VaultResult<()> {
        self.client.put(&self.id, &self.scoped_key(key), value).await
    }

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete(&self, key: &str) -> VaultResult<()> {
        self.client.delete(&self.id, &self.scoped_key(key)).await
    }

    /// Produces a sharing reference for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be shared.
    pub async fn share(&self, key: &str) -> VaultResult<String> {
        self.client.share(&self.id, &self.scoped_key(key)).await
    }
}
