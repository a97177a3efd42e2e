use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Collection prefix of persisted drafts.
pub const DRAFT_PREFIX: &str = "draft_";

/// Store key of the persisted draft shadowing `owner_key`.
pub fn draft_key(owner_key: &str) -> String {
    onyx_store::key::collection_member_key(DRAFT_PREFIX, owner_key)
}

/// What is being edited: message text or a structured copy of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DraftContent {
    Text(String),
    Object(Value),
}

impl DraftContent {
    /// Blank text (after trimming whitespace) or an empty object.
    pub fn is_blank(&self) -> bool {
        match self {
            DraftContent::Text(text) => text.trim().is_empty(),
            DraftContent::Object(value) => match value {
                Value::Null => true,
                Value::Object(map) => map.is_empty(),
                _ => false,
            },
        }
    }

    /// Length in characters, for text content.
    pub fn text_len(&self) -> Option<usize> {
        match self {
            DraftContent::Text(text) => Some(text.chars().count()),
            DraftContent::Object(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DraftContent::Text(text) => Some(text),
            DraftContent::Object(_) => None,
        }
    }
}

impl From<&str> for DraftContent {
    fn from(text: &str) -> Self {
        DraftContent::Text(text.to_string())
    }
}

impl From<String> for DraftContent {
    fn from(text: String) -> Self {
        DraftContent::Text(text)
    }
}

impl From<Value> for DraftContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => DraftContent::Text(text),
            other => DraftContent::Object(other),
        }
    }
}

/// Transient, uncommitted edit state shadowing one permanent entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub owner_key: String,
    pub content: DraftContent,
    pub created_at: OffsetDateTime,
}

/// Stored form of a draft under [`draft_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedDraft {
    pub(crate) content: DraftContent,
    pub(crate) original: DraftContent,
    pub(crate) created_at: String,
}

impl PersistedDraft {
    pub(crate) fn new(draft: &Draft, original: &DraftContent) -> Self {
        Self {
            content: draft.content.clone(),
            original: original.clone(),
            created_at: draft
                .created_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }

    pub(crate) fn created_at(&self) -> OffsetDateTime {
        OffsetDateTime::parse(&self.created_at, &Rfc3339)
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}
