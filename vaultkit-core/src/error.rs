use thiserror::Error;

use crate::signer::SignerError;
use crate::vault::VaultError;

/// Result type used across `VaultKit`.
pub type VaultKitResult<T, E = VaultKitError> = std::result::Result<T, E>;

/// Error outputs from `VaultKit`
#[derive(Debug, Error)]
pub enum VaultKitError {
    /// The wallet or its transport is unavailable
    #[error("connection_error: {0}")]
    Connection(String),
    /// The user declined to sign
    #[error("signature_rejected")]
    SignatureRejected,
    /// The witness service did not return a statement to sign
    #[error("statement_error: {0}")]
    Statement(String),
    /// The witness service did not return a credential token
    #[error("witness_error: {0}")]
    Witness(String),
    /// Vault provisioning or storage failure
    #[error(transparent)]
    Vault(#[from] VaultError),
    /// A stored secret is no longer accepted by the service that consumes it
    #[error("secret_validation_error: {0}")]
    SecretValidation(String),
    /// The credential token is malformed
    #[error("format_error: {0}")]
    Format(String),
    /// The operation is not valid in the current session state
    #[error("invalid_state: cannot {operation} while {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The session state at the time of the attempt.
        state: String,
    },
    /// A sign-in is already waiting for a signature
    #[error("sign_in_in_progress")]
    SignInInProgress,
    /// The bound identity changed while the operation was in flight; its result was discarded
    #[error("stale_session")]
    StaleSession,
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid.
        attribute: String,
        /// The reason the input is invalid.
        reason: String,
    },
    /// Unexpected error serializing information
    #[error("serialization_error: {error}")]
    Serialization {
        /// The error message from the serialization.
        error: String,
    },
    /// Network connection error with details
    #[error("network_error at {url}: {error}")]
    NetworkError {
        /// The URL of the request.
        url: String,
        /// The HTTP status code of the request.
        status: Option<u16>,
        /// The error message from the request.
        error: String,
    },
    /// HTTP request failure
    #[error("request_error: {error}")]
    Reqwest {
        /// The error message from the request.
        error: String,
    },
}

impl From<reqwest::Error> for VaultKitError {
    fn from(error: reqwest::Error) -> Self {
        Self::Reqwest {
            error: error.to_string(),
        }
    }
}

impl From<SignerError> for VaultKitError {
    fn from(error: SignerError) -> Self {
        match error {
            SignerError::Rejected => Self::SignatureRejected,
            SignerError::Connection(reason) => Self::Connection(reason),
        }
    }
}

impl VaultKitError {
    /// Whether the failure was the user declining to sign.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::SignatureRejected)
    }

    /// Whether a service refused an application secret.
    #[must_use]
    pub const fn is_secret_rejection(&self) -> bool {
        matches!(self, Self::SecretValidation(_))
    }
}
