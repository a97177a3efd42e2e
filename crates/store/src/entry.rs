use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field of a stored object that marks an optimistic change awaiting the server.
pub const PENDING_ACTION_FIELD: &str = "pendingAction";

/// Field of a stored object holding user-facing error messages keyed by
/// microsecond timestamp.
pub const ERRORS_FIELD: &str = "errors";

/// Kind of optimistic change an entry is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    Add,
    Update,
    Delete,
}

/// A typed view of one stored key.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEntry {
    pub key: String,
    pub value: Value,
    pub pending_action: Option<PendingAction>,
    pub errors: BTreeMap<String, String>,
}

impl StoreEntry {
    pub fn from_value(key: &str, value: Value) -> Self {
        let pending_action = value
            .get(PENDING_ACTION_FIELD)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        let errors = value
            .get(ERRORS_FIELD)
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        StoreEntry {
            key: key.to_string(),
            value,
            pending_action,
            errors,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_action.is_some()
    }

    /// The most recent error message, by timestamp key.
    pub fn latest_error(&self) -> Option<&str> {
        self.errors.values().next_back().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_pending_action_and_errors() {
        let entry = StoreEntry::from_value(
            "report_1",
            json!({
                "pendingAction": "delete",
                "errors": {"1700000000000001": "first", "1700000000000002": "second", "x": null}
            }),
        );
        assert_eq!(entry.pending_action, Some(PendingAction::Delete));
        assert_eq!(entry.errors.len(), 2);
        assert_eq!(entry.latest_error(), Some("second"));
    }

    #[test]
    fn scalar_value_has_no_metadata() {
        let entry = StoreEntry::from_value("session", json!("token"));
        assert!(!entry.is_pending());
        assert!(entry.errors.is_empty());
    }

    #[test]
    fn unknown_pending_action_is_ignored() {
        let entry = StoreEntry::from_value("k", json!({"pendingAction": "archive"}));
        assert_eq!(entry.pending_action, None);
    }
}
