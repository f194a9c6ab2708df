//! Session states and the transition table between them.

use strum::IntoStaticStr;

/// The step that raised a session [`SessionState::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FailedStage {
    /// The signature handshake failed or was rejected.
    SignIn,
    /// The vault existence check failed.
    VaultCheck,
}

/// Authentication state of a bound signer.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// No signature has been obtained yet.
    Disconnected,
    /// A signature has been requested from the wallet.
    AwaitingSignature,
    /// The signer proved control of its key.
    SessionEstablished,
    /// The vault existence check is in flight.
    VaultCheckPending,
    /// The identity has no vault yet.
    VaultMissing,
    /// The vault exists and can be used.
    Ready,
    /// The last operation failed; re-invoking it is allowed.
    Error {
        /// Which operation failed.
        stage: FailedStage,
        /// Human readable failure.
        reason: String,
    },
}

/// Inputs to [`SessionState::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEvent {
    SignInStarted,
    SignatureAccepted,
    SignatureFailed(String),
    VaultCheckStarted,
    VaultFound,
    VaultNotFound,
    VaultCheckFailed(String),
    VaultCheckAbandoned,
    VaultCreated,
    VaultCreateFailed,
}

impl SessionState {
    /// Whether the signer has already proved control of its key.
    #[must_use]
    pub const fn is_established(&self) -> bool {
        matches!(
            self,
            Self::SessionEstablished
                | Self::VaultCheckPending
                | Self::VaultMissing
                | Self::Ready
                | Self::Error {
                    stage: FailedStage::VaultCheck,
                    ..
                }
        )
    }

    /// Whether the vault has been confirmed to exist.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Short name of the state.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// The state reached by applying `event`, or `None` if the transition is not allowed.
    pub(crate) fn next(&self, event: SessionEvent) -> Option<Self> {
        use SessionEvent as E;

        let next = match (self, event) {
            (
                Self::Disconnected
                | Self::AwaitingSignature
                | Self::Error {
                    stage: FailedStage::SignIn,
                    ..
                },
                E::SignInStarted,
            ) => Self::AwaitingSignature,
            (Self::AwaitingSignature, E::SignatureAccepted) => Self::SessionEstablished,
            (Self::AwaitingSignature, E::SignatureFailed(reason)) => Self::Error {
                stage: FailedStage::SignIn,
                reason,
            },

            (
                Self::SessionEstablished
                | Self::Error {
                    stage: FailedStage::VaultCheck,
                    ..
                },
                E::VaultCheckStarted,
            ) => Self::VaultCheckPending,
            (Self::VaultCheckPending, E::VaultFound) => Self::Ready,
            (Self::VaultCheckPending, E::VaultNotFound) => Self::VaultMissing,
            (Self::VaultCheckPending, E::VaultCheckFailed(reason)) => Self::Error {
                stage: FailedStage::VaultCheck,
                reason,
            },
            (Self::VaultCheckPending, E::VaultCheckAbandoned) => Self::SessionEstablished,

            (Self::VaultMissing, E::VaultCreated) => Self::Ready,
            (Self::VaultMissing, E::VaultCreateFailed) => Self::VaultMissing,

            (
                Self::Disconnected
                | Self::AwaitingSignature
                | Self::SessionEstablished
                | Self::VaultCheckPending
                | Self::VaultMissing
                | Self::Ready
                | Self::Error { .. },
                E::SignInStarted
                | E::SignatureAccepted
                | E::SignatureFailed(_)
                | E::VaultCheckStarted
                | E::VaultFound
                | E::VaultNotFound
                | E::VaultCheckFailed(_)
                | E::VaultCheckAbandoned
                | E::VaultCreated
                | E::VaultCreateFailed,
            ) => return None,
        };
        Some(next)
    }
}
