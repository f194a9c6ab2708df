//! Decoding of issued credential tokens. Signatures are not verified.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use crate::error::{VaultKitError, VaultKitResult};

/// Standard alphabet, accepting payloads with or without padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes the payload of a `header.payload.signature` token into JSON.
///
/// The payload is base64url with `-`/`_` mapped back to `+`/`/`, so tokens
/// using either alphabet decode the same way. The decoded bytes must be UTF-8.
///
/// # Errors
///
/// Returns [`VaultKitError::Format`] unless the token has exactly three
/// segments and its payload decodes to UTF-8 JSON.
pub fn parse_jwt(token: &str) -> VaultKitResult<serde_json::Value> {
    let segments: Vec<&str> = token.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(VaultKitError::Format(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let translated = payload.replace('-', "+").replace('_', "/");
    let bytes = PAYLOAD_ENGINE
        .decode(translated)
        .map_err(|e| VaultKitError::Format(format!("payload is not base64: {e}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| VaultKitError::Format(format!("payload is not UTF-8: {e}")))?;

    serde_json::from_str(&text)
        .map_err(|e| VaultKitError::Format(format!("payload is not JSON: {e}")))
}
