use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::merge::merge_value;

/// How a patch combines with the value already stored at its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Deep-merge into the existing value.
    Merge,
    /// Replace the existing value wholesale.
    Set,
}

/// A described, idempotent transformation of one store key.
///
/// Serialized in the wire shape used by server-pushed updates:
/// `{"onyxMethod": "merge", "key": "cardList", "value": {...}}`.
/// A `null` value is the tombstone: it removes the key whatever the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePatch {
    #[serde(rename = "onyxMethod")]
    pub strategy: MergeStrategy,
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl StorePatch {
    pub fn merge(key: impl Into<String>, value: Value) -> Self {
        Self {
            strategy: MergeStrategy::Merge,
            key: key.into(),
            value,
        }
    }

    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            strategy: MergeStrategy::Set,
            key: key.into(),
            value,
        }
    }

    /// A patch that removes `key` from the store.
    pub fn remove(key: impl Into<String>) -> Self {
        Self::set(key, Value::Null)
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_null()
    }

    /// Compute the value the key holds after this patch.
    ///
    /// `None` means the key is absent afterwards.
    pub fn apply_to(&self, current: Option<Value>) -> Option<Value> {
        if self.is_tombstone() {
            return None;
        }
        match self.strategy {
            MergeStrategy::Set => Some(self.value.clone()),
            MergeStrategy::Merge => {
                let mut value = current.unwrap_or(Value::Null);
                merge_value(&mut value, self.value.clone());
                Some(value)
            }
        }
    }

    /// True when this patch writes `field` at the top level of its value.
    pub fn touches_field(&self, field: &str) -> bool {
        self.value
            .as_object()
            .is_some_and(|obj| obj.contains_key(field))
    }
}
