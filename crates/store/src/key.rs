//! Key namespace helpers.
//!
//! Collection-style keys are a collection prefix followed by an entity
//! identifier, e.g. `report_` + `42` → `report_42`.

use std::fmt::Display;

/// Build the member key for `id` inside the collection `prefix`.
pub fn collection_member_key(prefix: &str, id: impl Display) -> String {
    format!("{prefix}{id}")
}

/// True when `key` is a member of `prefix` (and not the bare prefix itself).
pub fn is_collection_member(key: &str, prefix: &str) -> bool {
    key.len() > prefix.len() && key.starts_with(prefix)
}

/// Return the entity identifier part of a collection member key.
pub fn split_collection_member_key<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    if is_collection_member(key, prefix) {
        Some(&key[prefix.len()..])
    } else {
        None
    }
}
