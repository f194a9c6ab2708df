//! Reconciliation of locally cached records with the records held in the vault.
//!
//! The remote copy always wins: a remote record replaces the local record with
//! the same id in place, and remote-only records are appended in remote order.
//! Records that cannot be merged are skipped one by one and listed in the
//! [`Reconciliation`] report instead of failing the whole merge.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{VaultKitError, VaultKitResult};
use crate::vault::VaultHandle;

/// A record keyed by `id`. Every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    /// Merge key, unique within one record set.
    pub id: String,
    /// Remaining fields of the record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DataItem {
    /// Creates a record with no fields besides its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A remote record that was left out of the merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSkip {
    /// Position of the record in the remote sequence.
    pub position: usize,
    /// Why the record could not be merged.
    pub reason: String,
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The reconciled view.
    pub items: Vec<DataItem>,
    /// Remote records that were skipped.
    pub skipped: Vec<MergeSkip>,
}

/// Merges `remote` into a copy of `local`.
///
/// Local order is preserved. A remote item whose id is already present
/// replaces that item at the same position; any other remote item is appended.
#[must_use]
pub fn merge(local: &[DataItem], remote: &[DataItem]) -> Vec<DataItem> {
    let mut merged = local.to_vec();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.len());
    for (position, item) in merged.iter().enumerate() {
        positions.entry(item.id.clone()).or_insert(position);
    }

    for item in remote {
        upsert(&mut merged, &mut positions, item.clone());
    }
    merged
}

/// Merges raw remote records into `local`, skipping records that are not
/// objects with a string `id`.
#[must_use]
pub fn reconcile(local: &[DataItem], remote: &[Value]) -> Reconciliation {
    let mut items = local.to_vec();
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        positions.entry(item.id.clone()).or_insert(position);
    }

    let mut skipped = Vec::new();
    for (position, raw) in remote.iter().enumerate() {
        match DataItem::deserialize(raw) {
            Ok(item) => upsert(&mut items, &mut positions, item),
            Err(e) => {
                log::warn!("skipping remote record at position {position}: {e}");
                skipped.push(MergeSkip {
                    position,
                    reason: e.to_string(),
                });
            }
        }
    }

    Reconciliation { items, skipped }
}

fn upsert(items: &mut Vec<DataItem>, positions: &mut HashMap<String, usize>, item: DataItem) {
    if let Some(&position) = positions.get(&item.id) {
        items[position] = item;
    } else {
        positions.insert(item.id.clone(), items.len());
        items.push(item);
    }
}

/// Parses the records stored in the vault.
///
/// The stored text may hold the list directly or a JSON string wrapping it.
/// Anything that is not a list yields no records.
///
/// # Errors
///
/// Returns [`VaultKitError::Serialization`] if the text is not valid JSON.
pub fn parse_items(raw: &str) -> VaultKitResult<Vec<Value>> {
    let mut value: Value = serde_json::from_str(raw).map_err(|e| invalid_json(&e))?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(|e| invalid_json(&e))?;
    }

    match value {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn invalid_json(e: &serde_json::Error) -> VaultKitError {
    VaultKitError::Serialization {
        error: format!("invalid JSON string: {e}"),
    }
}

/// Reads the records stored under `key` and reconciles them with `local`.
///
/// A missing key counts as an empty remote set.
///
/// # Errors
///
/// Returns an error if the vault read fails or the stored text is not JSON.
pub async fn pull(
    handle: &VaultHandle,
    key: &str,
    local: &[DataItem],
) -> VaultKitResult<Reconciliation> {
    let remote = match handle.get(key).await? {
        Some(entry) => parse_items(&entry.data)?,
        None => Vec::new(),
    };
    let report = reconcile(local, &remote);
    log::debug!(
        "reconciled {key}: {} local, {} remote, {} merged, {} skipped",
        local.len(),
        remote.len(),
        report.items.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Stores `items` under `key`.
///
/// # Errors
///
/// Returns an error if serialization or the vault write fails.
pub async fn push(handle: &VaultHandle, key: &str, items: &[DataItem]) -> VaultKitResult<()> {
    let data = serde_json::to_string(items).map_err(|e| VaultKitError::Serialization {
        error: format!("failed to serialize records: {e}"),
    })?;
    handle.put(key, &data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::vault::{MemoryVault, VaultId};

    fn item(id: &str, v: &str) -> DataItem {
        DataItem::new(id).with("v", v)
    }

    #[test]
    fn test_merge_example() {
        let local = vec![item("1", "a"), item("2", "b")];
        let remote = vec![item("2", "B"), item("3", "c")];
        assert_eq!(
            merge(&local, &remote),
            vec![item("1", "a"), item("2", "B"), item("3", "c")]
        );
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let local = vec![item("1", "a")];
        let remote = vec![item("1", "A")];
        let merged = merge(&local, &remote);
        assert_eq!(local, vec![item("1", "a")]);
        assert_eq!(remote, vec![item("1", "A")]);
        assert_eq!(merged, vec![item("1", "A")]);
    }

    #[test]
    fn test_merge_union_and_order() {
        let local: Vec<DataItem> = (0..6).map(|i| item(&i.to_string(), "local")).collect();
        let remote: Vec<DataItem> = [9, 4, 7, 0, 8]
            .iter()
            .map(|i| item(&i.to_string(), "remote"))
            .collect();

        let merged = merge(&local, &remote);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["0", "1", "2", "3", "4", "5", "9", "7", "8"]);

        let expected: BTreeSet<&str> = local
            .iter()
            .chain(remote.iter())
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids.iter().copied().collect::<BTreeSet<_>>(), expected);

        for remote_item in &remote {
            let merged_item = merged.iter().find(|i| i.id == remote_item.id).unwrap();
            assert_eq!(merged_item, remote_item);
        }
    }

    #[test]
    fn test_merge_with_empty_sides() {
        let items = vec![item("1", "a")];
        assert_eq!(merge(&items, &[]), items);
        assert_eq!(merge(&[], &items), items);
        assert!(merge(&[], &[]).is_empty());
    }

    #[test]
    fn test_reconcile_skips_records_without_id() {
        let local = vec![item("1", "a")];
        let remote = vec![
            json!({"id": "1", "v": "A"}),
            json!({"v": "no id"}),
            json!("not an object"),
            json!({"id": 7}),
            json!({"id": "2", "v": "b", "nested": {"x": 1}}),
        ];

        let report = reconcile(&local, &remote);
        assert_eq!(
            report.items,
            vec![
                item("1", "A"),
                item("2", "b").with("nested", json!({"x": 1})),
            ]
        );
        let positions: Vec<usize> = report.skipped.iter().map(|s| s.position).collect();
        assert_eq!(positions, [1, 2, 3]);
    }

    #[test]
    fn test_parse_items() {
        assert_eq!(parse_items(r#"[{"id":"1"}]"#).unwrap().len(), 1);
        assert_eq!(parse_items(r#""[{\"id\":\"1\"}]""#).unwrap().len(), 1);
        assert!(parse_items(r#"{"id":"1"}"#).unwrap().is_empty());
        assert!(parse_items("null").unwrap().is_empty());
        assert!(matches!(
            parse_items("not json"),
            Err(VaultKitError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_pull_and_push() {
        let id = VaultId::for_address("0x03", 1);
        let host = Arc::new(MemoryVault::with_vault(&id));
        let handle = VaultHandle::new(id, host, "chatbot");

        let report = pull(&handle, "conversations", &[item("1", "a")]).await.unwrap();
        assert_eq!(report.items, vec![item("1", "a")]);

        push(&handle, "conversations", &[item("1", "A"), item("2", "b")])
            .await
            .unwrap();
        let report = pull(&handle, "conversations", &[item("1", "a"), item("3", "c")])
            .await
            .unwrap();
        assert_eq!(
            report.items,
            vec![item("1", "A"), item("3", "c"), item("2", "b")]
        );
        assert!(report.skipped.is_empty());
    }
}
