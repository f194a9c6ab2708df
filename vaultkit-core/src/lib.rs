#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! `VaultKit` signs a user in with a wallet key pair, provisions the encrypted
//! vault owned by that key, keeps application secrets and records in it, and
//! issues witnessed attestation credentials for user content.
//!
//! The wallet ([`Signer`]) and the storage host ([`vault::VaultClient`]) are
//! capabilities supplied by the embedder.

use strum::EnumString;

/// Deployment the default endpoints are taken from.
#[derive(Debug, Clone, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Public witness service.
    Production,
    /// Services running on the developer's machine.
    Local,
}

mod config;
pub use config::KitConfig;

pub mod defaults;

mod error;
pub use error::*;

mod flow;
pub use flow::{Onboarding, Prompt, SecretPhase, Step};

pub mod issuers;

/// Forwards log output to an embedder-provided logger.
pub mod logger;

pub mod reconcile;

pub mod secret;

pub mod session;
pub use session::{Session, SessionManager, SessionState};

pub mod share;

mod signer;
pub use signer::{Signer, SignerError};

pub mod vault;

// private modules
mod http_request;
