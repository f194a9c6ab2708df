//! In-memory [`VaultClient`] implementation.
//!
//! Nothing is encrypted or persisted. It is meant for tests, the developer
//! CLI and embedders that want to exercise the session flow without a storage
//! host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use super::{VaultClient, VaultEntry, VaultError, VaultId, VaultResult};

/// In-memory vault host backed by a `HashMap` per vault.
#[derive(Default)]
pub struct MemoryVault {
    vaults: RwLock<HashMap<VaultId, HashMap<String, String>>>,
    unavailable: AtomicBool,
    exists_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl MemoryVault {
    /// Creates a host with no provisioned vaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a host where `vault` is already provisioned.
    #[must_use]
    pub fn with_vault(vault: &VaultId) -> Self {
        let host = Self::new();
        if let Ok(mut vaults) = host.vaults.write() {
            vaults.insert(vault.clone(), HashMap::new());
        }
        host
    }

    /// Makes every subsequent call fail with [`VaultError::Transport`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `exists` calls served so far.
    #[must_use]
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    /// Number of `create` calls served so far.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Returns the keys stored in `vault`, sorted.
    #[must_use]
    pub fn keys(&self, vault: &VaultId) -> Vec<String> {
        let Ok(vaults) = self.vaults.read() else {
            return Vec::new();
        };
        let mut keys: Vec<String> = vaults
            .get(vault)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn check_available(&self) -> VaultResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::Transport("storage host unavailable".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> VaultResult<RwLockReadGuard<'_, HashMap<VaultId, HashMap<String, String>>>> {
        self.check_available()?;
        self.vaults
            .read()
            .map_err(|_| VaultError::Transport("vault lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> VaultResult<RwLockWriteGuard<'_, HashMap<VaultId, HashMap<String, String>>>> {
        self.check_available()?;
        self.vaults
            .write()
            .map_err(|_| VaultError::Transport("vault lock poisoned".to_string()))
    }
}

#[async_trait]
impl VaultClient for MemoryVault {
    async fn exists(&self, vault: &VaultId) -> VaultResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.read()?.contains_key(vault))
    }

    async fn create(&self, vault: &VaultId) -> VaultResult<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.write()?.entry(vault.clone()).or_default();
        Ok(())
    }

    async fn get(&self, vault: &VaultId, key: &str) -> VaultResult<Option<VaultEntry>> {
        let vaults = self.read()?;
        let entries = vaults
            .get(vault)
            .ok_or_else(|| VaultError::NotFound(vault.to_string()))?;
        Ok(entries.get(key).map(|data| VaultEntry { data: data.clone() }))
    }

    async fn put(&self, vault: &VaultId, key: &str, value: &str) -> VaultResult<()> {
        let mut vaults = self.write()?;
        let entries = vaults
            .get_mut(vault)
            .ok_or_else(|| VaultError::NotFound(vault.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, vault: &VaultId, key: &str) -> VaultResult<()> {
        let mut vaults = self.write()?;
        let entries = vaults
            .get_mut(vault)
            .ok_or_else(|| VaultError::NotFound(vault.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn share(&self, vault: &VaultId, key: &str) -> VaultResult<String> {
        let vaults = self.read()?;
        let entries = vaults
            .get(vault)
            .ok_or_else(|| VaultError::NotFound(vault.to_string()))?;
        if !entries.contains_key(key) {
            return Err(VaultError::KeyNotFound(key.to_string()));
        }
        Ok(STANDARD.encode(format!("{vault}/{key}")))
    }
}
