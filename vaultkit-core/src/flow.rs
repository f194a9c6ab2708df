//! Guided onboarding: sign in, make sure a vault exists, then obtain a working
//! application secret from it.
//!
//! What the user should be asked next is a pure function of the session state
//! and what is known about the stored secret, see [`Prompt::for_state`].

use std::sync::{Arc, Mutex, PoisonError};

use secrecy::SecretString;

use crate::defaults::SECRET_API_KEY_NAME;
use crate::error::{VaultKitError, VaultKitResult};
use crate::secret::{SecretProbe, SecretStatus, SecretStore};
use crate::session::{SessionManager, SessionState};
use crate::vault::VaultId;

/// What is known about the application secret of the current vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretPhase {
    /// The vault has not been read yet.
    #[default]
    Unchecked,
    /// No secret is stored.
    Missing,
    /// The stored or submitted secret was rejected.
    Invalid,
    /// A secret was verified.
    Verified,
}

/// The next input to request from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Ask the user to sign in. `busy` while a step of the sign-in is running.
    SignIn {
        /// A sign-in step is in progress.
        busy: bool,
    },
    /// Offer to create the vault.
    CreateVault,
    /// Ask for the application secret.
    EnterSecret {
        /// The previous value was rejected.
        invalid: bool,
    },
    /// Nothing to ask; the application can run.
    None,
}

impl Prompt {
    /// The prompt for `state` given what is known about the secret.
    #[must_use]
    pub const fn for_state(state: &SessionState, secret: SecretPhase) -> Self {
        match state {
            SessionState::Disconnected | SessionState::Error { .. } => {
                Self::SignIn { busy: false }
            }
            SessionState::AwaitingSignature
            | SessionState::SessionEstablished
            | SessionState::VaultCheckPending => Self::SignIn { busy: true },
            SessionState::VaultMissing => Self::CreateVault,
            SessionState::Ready => match secret {
                SecretPhase::Verified => Self::None,
                SecretPhase::Invalid => Self::EnterSecret { invalid: true },
                SecretPhase::Unchecked | SecretPhase::Missing => {
                    Self::EnterSecret { invalid: false }
                }
            },
        }
    }
}

/// Result of an onboarding step.
#[derive(Debug)]
pub enum Step {
    /// More input is needed.
    Prompt(Prompt),
    /// Onboarding finished with a verified secret.
    Ready(SecretString),
}

/// Drives a [`SessionManager`] through sign-in and secret setup.
pub struct Onboarding {
    session: Arc<SessionManager>,
    probe: Arc<dyn SecretProbe>,
    secret_name: String,
    secret_phase: Mutex<Option<(VaultId, SecretPhase)>>,
}

impl Onboarding {
    /// Onboarding for `session`, validating secrets with `probe`.
    #[must_use]
    pub fn new(session: Arc<SessionManager>, probe: Arc<dyn SecretProbe>) -> Self {
        Self {
            session,
            probe,
            secret_name: SECRET_API_KEY_NAME.to_string(),
            secret_phase: Mutex::new(None),
        }
    }

    /// Uses `name` as the vault key of the secret.
    #[must_use]
    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = name.into();
        self
    }

    /// The session being driven.
    #[must_use]
    pub const fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The prompt for the current state.
    #[must_use]
    pub fn prompt(&self) -> Prompt {
        let state = self.session.state();
        Prompt::for_state(&state, self.phase())
    }

    /// Signs in, checks the vault and, if it exists, loads the secret.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step.
    pub async fn sign_in(&self) -> VaultKitResult<Step> {
        self.session.sign_in().await?;
        if !self.session.check_vault().await? {
            return Ok(Step::Prompt(Prompt::CreateVault));
        }
        self.load_secret().await
    }

    /// Creates the vault and asks for the secret.
    ///
    /// # Errors
    ///
    /// Returns an error if vault creation fails.
    pub async fn create_vault(&self) -> VaultKitResult<Step> {
        self.session.create_vault().await?;
        self.load_secret().await
    }

    /// Reads the stored secret and verifies it.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault is not ready or cannot be read.
    pub async fn load_secret(&self) -> VaultKitResult<Step> {
        let store = self.store()?;
        let status = store
            .load_verified(&self.secret_name, self.probe.as_ref())
            .await?;

        let (phase, step) = match status {
            SecretStatus::Verified(secret) => (SecretPhase::Verified, Step::Ready(secret)),
            SecretStatus::Missing => (
                SecretPhase::Missing,
                Step::Prompt(Prompt::EnterSecret { invalid: false }),
            ),
            SecretStatus::Invalid => (
                SecretPhase::Invalid,
                Step::Prompt(Prompt::EnterSecret { invalid: true }),
            ),
        };
        self.set_phase(store.vault_id(), phase);
        Ok(step)
    }

    /// Verifies `value` and stores it if accepted.
    ///
    /// A rejected value is reported as [`Prompt::EnterSecret`] with `invalid` set.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault is not ready, the value is blank, or the write fails.
    pub async fn submit_secret(&self, value: SecretString) -> VaultKitResult<Step> {
        let store = self.store()?;
        match store
            .submit(&self.secret_name, value, self.probe.as_ref())
            .await
        {
            Ok(secret) => {
                self.set_phase(store.vault_id(), SecretPhase::Verified);
                Ok(Step::Ready(secret))
            }
            Err(e) if e.is_secret_rejection() => {
                log::info!("submitted secret was rejected: {e}");
                self.set_phase(store.vault_id(), SecretPhase::Invalid);
                Ok(Step::Prompt(Prompt::EnterSecret { invalid: true }))
            }
            Err(e) => Err(e),
        }
    }

    /// Signs out and forgets the secret state.
    pub fn sign_out(&self) {
        self.session.sign_out();
        *self
            .secret_phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn store(&self) -> VaultKitResult<SecretStore> {
        let handle = self
            .session
            .vault()
            .ok_or_else(|| VaultKitError::InvalidState {
                operation: "access secrets",
                state: self.session.state().name().to_string(),
            })?;
        Ok(SecretStore::new(handle))
    }

    fn phase(&self) -> SecretPhase {
        let Some(vault) = self.session.vault() else {
            return SecretPhase::Unchecked;
        };
        let phase = self
            .secret_phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match phase.as_ref() {
            Some((id, phase)) if id == vault.id() => *phase,
            _ => SecretPhase::Unchecked,
        }
    }

    fn set_phase(&self, vault: &VaultId, phase: SecretPhase) {
        *self
            .secret_phase
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some((vault.clone(), phase));
    }
}
