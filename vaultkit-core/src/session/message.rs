//! Sign-in request text presented to the wallet.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::KitConfig;
use crate::error::VaultKitResult;

const NONCE_LENGTH: usize = 17;

/// Sign-in request following the EIP-4361 message layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInMessage {
    /// Domain requesting the sign-in.
    pub domain: String,
    /// Account asked to sign.
    pub address: String,
    /// Human readable statement.
    pub statement: String,
    /// Resource the sign-in grants access to.
    pub uri: String,
    /// Chain id of the account.
    pub chain_id: u64,
    /// Random value binding the signature to this request.
    pub nonce: String,
    /// RFC 3339 issue time.
    pub issued_at: String,
}

impl SignInMessage {
    /// New request for `address` with a fresh nonce and the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if no sign-in domain can be derived from `config`.
    pub fn new(config: &KitConfig, address: &str) -> VaultKitResult<Self> {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();

        Ok(Self {
            domain: config.sign_in_domain()?,
            address: address.to_string(),
            statement: config.statement.clone(),
            uri: config.sign_in_uri(),
            chain_id: config.chain_id,
            nonce,
            issued_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }
}

impl fmt::Display for SignInMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} wants you to sign in with your Ethereum account:",
            self.domain
        )?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if !self.statement.is_empty() {
            writeln!(f, "{}", self.statement)?;
            writeln!(f)?;
        }
        writeln!(f, "URI: {}", self.uri)?;
        writeln!(f, "Version: 1")?;
        writeln!(f, "Chain ID: {}", self.chain_id)?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        write!(f, "Issued At: {}", self.issued_at)
    }
}

/// The signed sign-in request kept for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProof {
    /// The exact text that was signed.
    pub message: String,
    /// The wallet's signature over `message`.
    pub signature: String,
}
