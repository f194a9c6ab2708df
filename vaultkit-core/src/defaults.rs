//! Built-in defaults and per-environment endpoints.

use crate::Environment;

/// Chain id of the sign-in message and the derived vault id.
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Prefix under which application keys live inside the vault.
pub const DEFAULT_STORAGE_PREFIX: &str = "chatbot";

/// Human readable statement shown in the sign-in request.
pub const DEFAULT_SIGN_IN_STATEMENT: &str = "Sign into ChatBot!";

/// Vault key of the application API key.
pub const SECRET_API_KEY_NAME: &str = "openai-api-key";

/// Origin used for sharing links when none is configured.
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

/// Endpoint used to verify a stored API key still works.
pub const DEFAULT_PROBE_URL: &str = "https://api.openai.com/v1/models";

/// Default endpoints for an [`Environment`].
pub trait DefaultEndpoints {
    /// Base URL of the witness service.
    fn witness_url(&self) -> &'static str;
}

impl DefaultEndpoints for Environment {
    fn witness_url(&self) -> &'static str {
        match self {
            Self::Production => "https://rebasedemo.spruceid.workers.dev",
            Self::Local => "http://localhost:8787",
        }
    }
}
