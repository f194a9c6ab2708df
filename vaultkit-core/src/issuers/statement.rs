//! Canonical attestation statements and the witness wire format.

use serde::{Deserialize, Serialize};

use crate::error::{VaultKitError, VaultKitResult};

/// Chain id placed in every statement subject.
///
/// Statements always name chain `1`, regardless of the network the signer is
/// connected to.
pub const STATEMENT_CHAIN_ID: &str = "1";

/// What is being attested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Short title of the attested content.
    pub title: String,
    /// The attested content itself.
    pub body: String,
}

#[derive(Serialize)]
struct ConversationAttestation<'a> {
    model: &'a str,
    prompt: &'a str,
    messages: &'a [serde_json::Value],
}

impl Content {
    /// Creates content from a title and a body.
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Attestation content for a conversation: the body is the compact JSON
    /// object `{ model, prompt, messages }` and the title is the conversation name.
    ///
    /// # Errors
    ///
    /// Returns [`VaultKitError::Serialization`] if the messages cannot be serialized.
    pub fn from_conversation(
        name: &str,
        model_id: &str,
        prompt: &str,
        messages: &[serde_json::Value],
    ) -> VaultKitResult<Self> {
        let body = serde_json::to_string(&ConversationAttestation {
            model: model_id,
            prompt,
            messages,
        })
        .map_err(|e| VaultKitError::Serialization {
            error: format!("failed to serialize conversation: {e}"),
        })?;
        Ok(Self::new(name, body))
    }
}

/// File name offered when saving the credential issued for `name`.
///
/// Only the first space is replaced.
#[must_use]
pub fn credential_file_name(name: &str) -> String {
    format!("{}_credential.jwt", name.replacen(' ', "_", 1))
}

/// `eip155` account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip155Subject {
    /// Account address, passed through as given.
    pub address: String,
    /// Chain id as a decimal string.
    pub chain_id: String,
}

/// Public key hash subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkhSubject {
    /// The `eip155` account.
    pub eip155: Eip155Subject,
}

/// The subject of a statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Public key hash form of the subject.
    pub pkh: PkhSubject,
}

impl Subject {
    /// Subject for `address`.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        Self {
            pkh: PkhSubject {
                eip155: Eip155Subject {
                    address: address.to_string(),
                    chain_id: STATEMENT_CHAIN_ID.to_string(),
                },
            },
        }
    }
}

/// A basic post attestation statement.
///
/// Built deterministically from `(content, address)`; two statements built
/// from equal inputs are equal and serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Who attests.
    pub subject: Subject,
    /// Attested body.
    pub body: String,
    /// Attested title.
    pub title: String,
    /// Always `null`.
    pub reply_to: Option<String>,
}

impl Statement {
    /// Builds the canonical statement for `content` signed by `address`.
    #[must_use]
    pub fn new(content: &Content, address: &str) -> Self {
        Self {
            subject: Subject::from_address(address),
            body: content.body.clone(),
            title: content.title.clone(),
            reply_to: None,
        }
    }
}

/// Statement kinds understood by the witness service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationStatement {
    /// A titled post.
    BasicPostAttestation(Statement),
}

/// Body of a statement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementRequest {
    /// An attestation statement.
    Attestation(AttestationStatement),
}

impl StatementRequest {
    /// Statement request for a basic post.
    #[must_use]
    pub fn basic_post(statement: Statement) -> Self {
        Self::Attestation(AttestationStatement::BasicPostAttestation(statement))
    }
}

/// A signed basic post statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicPostProof {
    /// Signature over the statement text returned by the witness service.
    pub signature: String,
    /// The statement structure that was submitted.
    pub statement: Statement,
}

/// Proof kinds understood by the witness service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationProof {
    /// A signed titled post.
    BasicPostAttestation(BasicPostProof),
}

/// Body of a witness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofRequest {
    /// An attestation proof.
    Attestation(AttestationProof),
}

impl ProofRequest {
    /// Witness request for a signed basic post.
    #[must_use]
    pub fn basic_post(statement: Statement, signature: String) -> Self {
        Self::Attestation(AttestationProof::BasicPostAttestation(BasicPostProof {
            signature,
            statement,
        }))
    }
}

/// Response of the statement phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatementResponse {
    /// Text to sign.
    pub statement: Option<String>,
    /// Error reported by the service, if any.
    pub error: Option<serde_json::Value>,
}

/// Response of the witness phase.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtResponse {
    /// The issued credential.
    pub jwt: Option<String>,
    /// Error reported by the service, if any.
    pub error: Option<serde_json::Value>,
}
