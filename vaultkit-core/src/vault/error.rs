//! Error types for vault components.

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors raised by vault clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The storage host could not be reached or refused the request.
    #[error("vault transport error: {0}")]
    Transport(String),

    /// The vault has not been provisioned for this identity.
    #[error("vault not found: {0}")]
    NotFound(String),

    /// The requested key has no value.
    #[error("vault key not found: {0}")]
    KeyNotFound(String),

    /// Serialization/deserialization failures.
    #[error("vault serialization error: {0}")]
    Serialization(String),
}
