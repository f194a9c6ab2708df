//! Content attestation credentials.

mod attestation;
mod jwt;
mod statement;

pub use attestation::AttestationIssuer;
pub use jwt::parse_jwt;
pub use statement::{
    credential_file_name, AttestationProof, AttestationStatement, BasicPostProof, Content,
    Eip155Subject, JwtResponse, PkhSubject, ProofRequest, Statement, StatementRequest,
    StatementResponse, Subject, STATEMENT_CHAIN_ID,
};
