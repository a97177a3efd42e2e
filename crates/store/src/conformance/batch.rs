use std::sync::Arc;

use serde_json::json;

use super::{expect_eq, TestResult};
use crate::{LocalStore, StorageProvider, StoreConfig};

pub(super) fn run_batch_tests<P, F>(factory: &F) -> Vec<TestResult>
where
    P: StorageProvider,
    F: Fn() -> P,
{
    vec![
        TestResult::from_result(
            "batch",
            "later_change_in_batch_wins",
            later_change_in_batch_wins(factory),
        ),
        TestResult::from_result(
            "batch",
            "batches_apply_in_order",
            batches_apply_in_order(factory),
        ),
        TestResult::from_result(
            "batch",
            "store_reinit_sees_previous_state",
            store_reinit_sees_previous_state(factory),
        ),
        TestResult::from_result(
            "batch",
            "store_clear_is_persisted",
            store_clear_is_persisted(factory),
        ),
    ]
}

fn later_change_in_batch_wins<P: StorageProvider, F: Fn() -> P>(
    factory: &F,
) -> Result<(), String> {
    let provider = factory();
    provider
        .write_batch(&[
            ("k".to_string(), Some(json!("first"))),
            ("k".to_string(), None),
            ("k".to_string(), Some(json!("last"))),
        ])
        .map_err(|e| format!("write: {e}"))?;
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("k", entries.get("k").cloned(), Some(json!("last")))
}

fn batches_apply_in_order<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = factory();
    for i in 0..5 {
        provider
            .write_batch(&[("counter".to_string(), Some(json!(i)))])
            .map_err(|e| format!("write {i}: {e}"))?;
    }
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("counter", entries.get("counter").cloned(), Some(json!(4)))
}

fn store_reinit_sees_previous_state<P: StorageProvider, F: Fn() -> P>(
    factory: &F,
) -> Result<(), String> {
    let provider = Arc::new(factory());

    let store = LocalStore::init(StoreConfig::default().with_provider(provider.clone()))
        .map_err(|e| format!("init: {e}"))?;
    store
        .merge("report_1", json!({"name": "Trip"}))
        .map_err(|e| format!("merge: {e}"))?;
    store
        .merge("report_1", json!({"total": 10}))
        .map_err(|e| format!("merge: {e}"))?;
    store
        .set("draft_1", json!("hello"))
        .map_err(|e| format!("set: {e}"))?;
    store.remove("draft_1").map_err(|e| format!("remove: {e}"))?;
    store.teardown().map_err(|e| format!("teardown: {e}"))?;

    let reopened = LocalStore::init(StoreConfig::default().with_provider(provider))
        .map_err(|e| format!("reinit: {e}"))?;
    expect_eq(
        "report_1",
        reopened.get("report_1"),
        Some(json!({"name": "Trip", "total": 10})),
    )?;
    expect_eq("draft_1", reopened.get("draft_1"), None)
}

fn store_clear_is_persisted<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = Arc::new(factory());

    let store = LocalStore::init(StoreConfig::default().with_provider(provider.clone()))
        .map_err(|e| format!("init: {e}"))?;
    store
        .set("session", json!({"authToken": "t"}))
        .map_err(|e| format!("set: {e}"))?;
    store
        .set("report_1", json!({}))
        .map_err(|e| format!("set: {e}"))?;
    store.clear(&["session"]).map_err(|e| format!("clear: {e}"))?;

    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("entry count", entries.len(), 1)?;
    expect_eq("session kept", entries.contains_key("session"), true)
}
