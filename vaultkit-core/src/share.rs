//! Sharing vault objects through links that resolve on the application origin.

use url::Url;

use crate::config::KitConfig;
use crate::error::{VaultKitError, VaultKitResult};
use crate::reconcile::DataItem;
use crate::vault::VaultHandle;

const SHARE_PARAM: &str = "share";
const SHARE_KEY_PREFIX: &str = "share";

/// Builds the link under which `reference` can be opened.
#[must_use]
pub fn build_link(origin: &str, reference: &str) -> String {
    format!(
        "{}/?{SHARE_PARAM}={reference}",
        origin.trim_end_matches('/')
    )
}

/// Extracts the share reference from a link built by [`build_link`].
///
/// Both raw and percent-encoded references are accepted.
///
/// # Errors
///
/// Returns [`VaultKitError::InvalidInput`] if `link` is not a URL or carries no reference.
pub fn parse_link(link: &str) -> VaultKitResult<String> {
    let url = Url::parse(link).map_err(|e| invalid_link(e.to_string()))?;
    let reference = url
        .query_pairs()
        .find(|(name, _)| name == SHARE_PARAM)
        .map(|(_, value)| value.replace(' ', "+"))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid_link(format!("no {SHARE_PARAM} parameter")))?;
    Ok(reference)
}

fn invalid_link(reason: String) -> VaultKitError {
    VaultKitError::InvalidInput {
        attribute: "share_link".to_string(),
        reason,
    }
}

/// Vault key a shared copy of `item` is written to.
#[must_use]
pub fn share_key(item: &DataItem) -> String {
    format!("{SHARE_KEY_PREFIX}/{}", item.id)
}

/// Publishes a copy of `item` and returns a link to it.
///
/// # Errors
///
/// Returns an error if the item cannot be serialized, written or shared.
pub async fn share_item(
    handle: &VaultHandle,
    config: &KitConfig,
    item: &DataItem,
) -> VaultKitResult<String> {
    let key = share_key(item);
    let data = serde_json::to_string(item).map_err(|e| VaultKitError::Serialization {
        error: format!("failed to serialize shared record: {e}"),
    })?;
    handle.put(&key, &data).await?;
    let reference = handle.share(&key).await?;
    log::info!("shared {key} from {}", handle.id());
    Ok(build_link(config.origin(), &reference))
}
