//! The signing capability supplied by a wallet integration.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a [`Signer`] may report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The user declined the signature request.
    #[error("signature request rejected")]
    Rejected,
    /// The wallet or its transport could not be reached.
    #[error("wallet unavailable: {0}")]
    Connection(String),
}

/// A key pair that can sign arbitrary text on behalf of the user.
///
/// Implementations are provided by the wallet layer. The signature encoding is
/// opaque to `VaultKit` and is passed through unmodified.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The account address the signer signs for, e.g. `0xabc…`.
    fn address(&self) -> String;

    /// Signs `text` and returns the encoded signature.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Rejected`] if the user declines, or
    /// [`SignerError::Connection`] if the wallet cannot be reached.
    async fn sign_message(&self, text: &str) -> Result<String, SignerError>;
}
