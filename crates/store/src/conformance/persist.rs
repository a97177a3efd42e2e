use serde_json::json;

use super::{expect_eq, TestResult};
use crate::StorageProvider;

pub(super) fn run_persist_tests<P, F>(factory: &F) -> Vec<TestResult>
where
    P: StorageProvider,
    F: Fn() -> P,
{
    vec![
        TestResult::from_result(
            "persist",
            "fresh_provider_is_empty",
            fresh_provider_is_empty(factory),
        ),
        TestResult::from_result(
            "persist",
            "written_value_loads_back",
            written_value_loads_back(factory),
        ),
        TestResult::from_result(
            "persist",
            "tombstone_removes_key",
            tombstone_removes_key(factory),
        ),
        TestResult::from_result(
            "persist",
            "removing_absent_key_is_noop",
            removing_absent_key_is_noop(factory),
        ),
        TestResult::from_result(
            "persist",
            "nested_values_preserved",
            nested_values_preserved(factory),
        ),
    ]
}

fn fresh_provider_is_empty<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = factory();
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("entry count", entries.len(), 0)
}

fn written_value_loads_back<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = factory();
    provider
        .write_batch(&[("session".to_string(), Some(json!({"authToken": "abc"})))])
        .map_err(|e| format!("write: {e}"))?;
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq(
        "session",
        entries.get("session").cloned(),
        Some(json!({"authToken": "abc"})),
    )
}

fn tombstone_removes_key<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = factory();
    provider
        .write_batch(&[
            ("a".to_string(), Some(json!(1))),
            ("b".to_string(), Some(json!(2))),
        ])
        .map_err(|e| format!("write: {e}"))?;
    provider
        .write_batch(&[("a".to_string(), None)])
        .map_err(|e| format!("remove: {e}"))?;
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("a present", entries.contains_key("a"), false)?;
    expect_eq("b", entries.get("b").cloned(), Some(json!(2)))
}

fn removing_absent_key_is_noop<P: StorageProvider, F: Fn() -> P>(
    factory: &F,
) -> Result<(), String> {
    let provider = factory();
    provider
        .write_batch(&[("ghost".to_string(), None)])
        .map_err(|e| format!("remove: {e}"))?;
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("entry count", entries.len(), 0)
}

fn nested_values_preserved<P: StorageProvider, F: Fn() -> P>(factory: &F) -> Result<(), String> {
    let provider = factory();
    let value = json!({
        "reportID": "42",
        "participants": [1, 2, 3],
        "errors": {"1700000000000000": "Unexpected error"},
        "total": -12.5,
        "pendingAction": null
    });
    provider
        .write_batch(&[("report_42".to_string(), Some(value.clone()))])
        .map_err(|e| format!("write: {e}"))?;
    let entries = provider.load_all().map_err(|e| format!("load: {e}"))?;
    expect_eq("report_42", entries.get("report_42").cloned(), Some(value))
}
