//! Key-pair sign-in and the vault lifecycle of the signed-in identity.
//!
//! [`SessionManager`] owns the binding to the current [`Signer`] and drives the
//! session through [`SessionState`]. Every binding change bumps a generation
//! counter; asynchronous steps capture the generation when they start and
//! discard their result if it changed while they were suspended.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::config::KitConfig;
use crate::error::{VaultKitError, VaultKitResult};
use crate::signer::Signer;
use crate::vault::{VaultClient, VaultHandle, VaultId, VaultProvisioner};

mod message;
mod state;

pub use message::{SessionProof, SignInMessage};
use state::SessionEvent;
pub use state::{FailedStage, SessionState};

/// Point-in-time view of the bound signer's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Address of the bound signer.
    pub signer_address: String,
    /// Current state.
    pub state: SessionState,
    /// Whether the vault is known to exist. Only true in [`SessionState::Ready`].
    pub vault_ready: bool,
}

struct Inner {
    signer: Option<Arc<dyn Signer>>,
    generation: u64,
    state: SessionState,
    sign_in_in_flight: bool,
    proof: Option<SessionProof>,
    vault: Option<VaultHandle>,
}

impl Inner {
    fn session(&self) -> Option<Session> {
        self.signer.as_ref().map(|signer| Session {
            signer_address: signer.address(),
            state: self.state.clone(),
            vault_ready: self.state.is_ready(),
        })
    }

    fn reset(&mut self, signer: Option<Arc<dyn Signer>>) {
        self.signer = signer;
        self.generation = self.generation.wrapping_add(1);
        self.state = SessionState::Disconnected;
        self.sign_in_in_flight = false;
        self.proof = None;
        self.vault = None;
    }

    fn apply(&mut self, operation: &'static str, event: SessionEvent) -> VaultKitResult<()> {
        let next = self
            .state
            .next(event)
            .ok_or_else(|| VaultKitError::InvalidState {
                operation,
                state: self.state.name().to_string(),
            })?;
        self.state = next;
        Ok(())
    }

    fn bound_signer(&self, operation: &'static str) -> VaultKitResult<Arc<dyn Signer>> {
        self.signer
            .clone()
            .ok_or_else(|| VaultKitError::InvalidState {
                operation,
                state: "unbound".to_string(),
            })
    }
}

/// Drives sign-in, vault detection and vault creation for one signer at a time.
pub struct SessionManager {
    config: KitConfig,
    provisioner: VaultProvisioner,
    inner: Mutex<Inner>,
    updates: watch::Sender<Option<Session>>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a manager with no bound signer.
    #[must_use]
    pub fn new(config: KitConfig, client: Arc<dyn VaultClient>) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            config,
            provisioner: VaultProvisioner::new(client),
            inner: Mutex::new(Inner {
                signer: None,
                generation: 0,
                state: SessionState::Disconnected,
                sign_in_in_flight: false,
                proof: None,
                vault: None,
            }),
            updates,
        }
    }

    /// The configuration the manager was created with.
    #[must_use]
    pub const fn config(&self) -> &KitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.updates.send_replace(inner.session());
    }

    /// Binds `signer`.
    ///
    /// Rebinding the same address once the session is established is a no-op.
    /// Binding a different address tears the previous session down; results
    /// of operations still in flight for it are discarded.
    pub fn bind(&self, signer: Arc<dyn Signer>) {
        let address = signer.address();
        let mut inner = self.lock();

        let current = inner.signer.as_ref().map(|current| current.address());
        if let Some(current) = current {
            if current.eq_ignore_ascii_case(&address) {
                if inner.state.is_established() {
                    log::debug!("{address} is already signed in; ignoring rebind");
                } else {
                    inner.signer = Some(signer);
                }
                return;
            }
            log::info!("signer changed from {current} to {address}; resetting session");
        }

        inner.reset(Some(signer));
        self.publish(&inner);
    }

    /// Drops the bound signer and its session.
    pub fn unbind(&self) {
        let mut inner = self.lock();
        if inner.signer.is_none() {
            return;
        }
        inner.reset(None);
        self.publish(&inner);
    }

    /// Follows the wallet connection: binds the connected signer, or unbinds when disconnected.
    pub fn on_wallet_change(&self, signer: Option<Arc<dyn Signer>>) {
        match signer {
            Some(signer) => self.bind(signer),
            None => self.unbind(),
        }
    }

    /// Ends the session. Always succeeds, whatever the current state.
    pub fn sign_out(&self) {
        let mut inner = self.lock();
        log::info!("signing out from state {}", inner.state.name());
        inner.reset(None);
        self.publish(&inner);
    }

    /// Asks the bound signer to sign a fresh sign-in request.
    ///
    /// Allowed from [`SessionState::Disconnected`], from
    /// [`SessionState::AwaitingSignature`] once a previous attempt was
    /// abandoned, and after a failed sign-in.
    ///
    /// # Errors
    ///
    /// - [`VaultKitError::SignInInProgress`] while another sign-in waits for its signature.
    /// - [`VaultKitError::InvalidState`] if no signer is bound or the session is established.
    /// - [`VaultKitError::SignatureRejected`] or [`VaultKitError::Connection`] if signing fails.
    /// - [`VaultKitError::StaleSession`] if the binding changed while waiting.
    pub async fn sign_in(&self) -> VaultKitResult<SessionProof> {
        const OPERATION: &str = "sign in";

        let (signer, generation, message) = {
            let mut inner = self.lock();
            let signer = inner.bound_signer(OPERATION)?;
            if inner.sign_in_in_flight {
                return Err(VaultKitError::SignInInProgress);
            }
            let message = SignInMessage::new(&self.config, &signer.address())?;
            inner.apply(OPERATION, SessionEvent::SignInStarted)?;
            inner.sign_in_in_flight = true;
            self.publish(&inner);
            (signer, inner.generation, message.to_string())
        };

        let guard = Suspended::new(self, generation, SuspendedStep::SignIn);
        let result = signer.sign_message(&message).await;
        guard.disarm();

        let mut inner = self.lock();
        if inner.generation != generation {
            log::warn!("discarding sign-in result for a replaced session");
            return Err(VaultKitError::StaleSession);
        }
        inner.sign_in_in_flight = false;

        let outcome = match result {
            Ok(signature) => {
                inner.apply(OPERATION, SessionEvent::SignatureAccepted)?;
                let proof = SessionProof { message, signature };
                inner.proof = Some(proof.clone());
                log::info!("signed in as {}", signer.address());
                Ok(proof)
            }
            Err(e) => {
                log::warn!("sign-in failed: {e}");
                inner.apply(OPERATION, SessionEvent::SignatureFailed(e.to_string()))?;
                Err(e.into())
            }
        };
        self.publish(&inner);
        drop(inner);
        outcome
    }

    /// Checks whether the signed-in identity owns a vault.
    ///
    /// Returns whether the vault exists; the session moves to
    /// [`SessionState::Ready`] or [`SessionState::VaultMissing`] accordingly.
    ///
    /// # Errors
    ///
    /// - [`VaultKitError::InvalidState`] unless the session is established and no check is running.
    ///   A check whose future was dropped before the host answered no longer counts as running.
    /// - [`VaultKitError::Vault`] if the storage host fails; the session records the failure.
    /// - [`VaultKitError::StaleSession`] if the binding changed while waiting.
    pub async fn check_vault(&self) -> VaultKitResult<bool> {
        const OPERATION: &str = "check vault";

        let (vault_id, generation) = {
            let mut inner = self.lock();
            let signer = inner.bound_signer(OPERATION)?;
            inner.apply(OPERATION, SessionEvent::VaultCheckStarted)?;
            self.publish(&inner);
            (self.vault_id(signer.as_ref()), inner.generation)
        };

        let guard = Suspended::new(self, generation, SuspendedStep::VaultCheck);
        let result = self.provisioner.exists(&vault_id).await;
        guard.disarm();

        let mut inner = self.lock();
        if inner.generation != generation {
            log::warn!("discarding vault check result for a replaced session");
            return Err(VaultKitError::StaleSession);
        }

        let outcome = match result {
            Ok(true) => {
                inner.apply(OPERATION, SessionEvent::VaultFound)?;
                inner.vault = Some(self.handle(vault_id));
                Ok(true)
            }
            Ok(false) => {
                inner.apply(OPERATION, SessionEvent::VaultNotFound)?;
                Ok(false)
            }
            Err(e) => {
                log::error!("vault check for {vault_id} failed: {e}");
                inner.apply(OPERATION, SessionEvent::VaultCheckFailed(e.to_string()))?;
                Err(e.into())
            }
        };
        self.publish(&inner);
        drop(inner);
        outcome
    }

    /// Provisions the vault of the signed-in identity.
    ///
    /// # Errors
    ///
    /// - [`VaultKitError::InvalidState`] unless the session is in [`SessionState::VaultMissing`].
    /// - [`VaultKitError::Vault`] if provisioning fails; the session stays in
    ///   [`SessionState::VaultMissing`] so the user can retry.
    /// - [`VaultKitError::StaleSession`] if the binding changed while waiting.
    pub async fn create_vault(&self) -> VaultKitResult<VaultHandle> {
        const OPERATION: &str = "create vault";

        let (vault_id, generation) = {
            let inner = self.lock();
            let signer = inner.bound_signer(OPERATION)?;
            if inner.state.next(SessionEvent::VaultCreated).is_none() {
                return Err(VaultKitError::InvalidState {
                    operation: OPERATION,
                    state: inner.state.name().to_string(),
                });
            }
            (self.vault_id(signer.as_ref()), inner.generation)
        };

        let result = self.provisioner.create(&vault_id).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            log::warn!("discarding vault creation result for a replaced session");
            return Err(VaultKitError::StaleSession);
        }

        let outcome = match result {
            Ok(()) => {
                inner.apply(OPERATION, SessionEvent::VaultCreated)?;
                let handle = self.handle(vault_id);
                inner.vault = Some(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                log::error!("creating vault {vault_id} failed: {e}");
                inner.apply(OPERATION, SessionEvent::VaultCreateFailed)?;
                Err(e.into())
            }
        };
        self.publish(&inner);
        drop(inner);
        outcome
    }

    /// The current session, or `None` when no signer is bound.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.lock().session()
    }

    /// The current state. [`SessionState::Disconnected`] when no signer is bound.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state.clone()
    }

    /// The bound signer.
    #[must_use]
    pub fn signer(&self) -> Option<Arc<dyn Signer>> {
        self.lock().signer.clone()
    }

    /// The signed sign-in request of the current session.
    #[must_use]
    pub fn proof(&self) -> Option<SessionProof> {
        self.lock().proof.clone()
    }

    /// Handle to the identity's vault. Only available in [`SessionState::Ready`].
    #[must_use]
    pub fn vault(&self) -> Option<VaultHandle> {
        let inner = self.lock();
        if inner.state.is_ready() {
            inner.vault.clone()
        } else {
            None
        }
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.updates.subscribe()
    }

    fn vault_id(&self, signer: &dyn Signer) -> VaultId {
        VaultId::for_address(&signer.address(), self.config.chain_id)
    }

    fn handle(&self, vault_id: VaultId) -> VaultHandle {
        VaultHandle::new(
            vault_id,
            self.provisioner.client(),
            self.config.storage_prefix.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum SuspendedStep {
    SignIn,
    VaultCheck,
}

/// Undoes the bookkeeping of a step whose future is dropped before its answer arrives.
///
/// An abandoned sign-in clears the in-flight flag; an abandoned vault check
/// returns the session to [`SessionState::SessionEstablished`].
struct Suspended<'a> {
    manager: &'a SessionManager,
    generation: u64,
    step: SuspendedStep,
    armed: bool,
}

impl<'a> Suspended<'a> {
    const fn new(manager: &'a SessionManager, generation: u64, step: SuspendedStep) -> Self {
        Self {
            manager,
            generation,
            step,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.manager.lock();
        if inner.generation != self.generation {
            return;
        }
        match self.step {
            SuspendedStep::SignIn => {
                log::debug!("sign-in abandoned before the wallet answered");
                inner.sign_in_in_flight = false;
            }
            SuspendedStep::VaultCheck => {
                log::debug!("vault check abandoned before the host answered");
                if let Some(next) = inner.state.next(SessionEvent::VaultCheckAbandoned) {
                    inner.state = next;
                    self.manager.publish(&inner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
