//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `onyx` binary and verify exit codes,
//! stdout content, and stderr content. Commands run from the workspace root
//! so the `demos/` scenarios resolve; store and config files live in temp dirs.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Locate the workspace root by walking up from CARGO_MANIFEST_DIR.
fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    // crates/cli -> workspace root is two levels up
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

/// Helper: create a Command for the `onyx` binary, rooted at workspace.
fn onyx() -> Command {
    let mut cmd = cargo_bin_cmd!("onyx");
    cmd.current_dir(workspace_root());
    cmd.env_remove("ONYX_LOG");
    cmd.env_remove("ONYX_AUTH_TOKEN");
    cmd
}

fn write_json(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn sample_store(dir: &TempDir) -> PathBuf {
    write_json(
        dir,
        "store.json",
        &json!({
            "session": {"email": "user@example.com"},
            "report_1": {"reportName": "Lunch", "pendingAction": "update"},
            "report_2": {"reportName": "Taxi", "errors": {"1700000000000000": "Couldn't rename"}},
        }),
    )
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    onyx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Optimistic mutation store toolkit"));
}

#[test]
fn version_exits_0() {
    onyx()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("onyx"));
}

#[test]
fn unknown_subcommand_fails() {
    onyx().arg("frobnicate").assert().failure();
}

// ──────────────────────────────────────────────
// 2. Inspect
// ──────────────────────────────────────────────

#[test]
fn inspect_prints_entries_with_markers() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    onyx()
        .arg("inspect")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("session = "))
        .stdout(predicate::str::contains("[pending update]"))
        .stdout(predicate::str::contains("[error: Couldn't rename]"))
        .stdout(predicate::str::contains("3 key(s), 0 pending request(s)"));
}

#[test]
fn inspect_collection_filters_members() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    let assert = onyx()
        .args(["--output", "json", "inspect"])
        .arg(&store)
        .args(["--collection", "report_"])
        .assert()
        .success();

    let out: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["report_1", "report_2"]);
}

#[test]
fn inspect_single_key() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    onyx()
        .arg("inspect")
        .arg(&store)
        .args(["--key", "session"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user@example.com"))
        .stdout(predicate::str::contains("report_1").not());
}

#[test]
fn inspect_missing_key_exits_1() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    onyx()
        .arg("inspect")
        .arg(&store)
        .args(["--key", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key not found: nope"));
}

#[test]
fn inspect_missing_file_exits_1() {
    onyx()
        .args(["inspect", "does/not/exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("store file not found"));
}

#[test]
fn inspect_missing_file_json_error() {
    onyx()
        .args(["--output", "json", "inspect", "does/not/exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}

#[test]
fn inspect_uses_configured_store_path() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);
    let config = dir.path().join("onyx.toml");
    fs::write(
        &config,
        format!("[store]\npath = {:?}\n", store.display().to_string()),
    )
    .unwrap();

    onyx()
        .arg("--config")
        .arg(&config)
        .arg("inspect")
        .assert()
        .success()
        .stdout(predicate::str::contains("session = "));
}

// ──────────────────────────────────────────────
// 3. Simulate
// ──────────────────────────────────────────────

#[test]
fn simulate_replacement_card_demo() {
    let assert = onyx()
        .args(["--output", "json", "simulate", "demos/replacement_card.json"])
        .assert()
        .success();

    let out: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let outcomes = out["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["status"], json!("failure"));
    assert_eq!(outcomes[0]["kind"], json!("network"));
    assert_eq!(outcomes[1]["status"], json!("success"));

    let cards = &out["store"]["cardList"];
    assert_eq!(cards["isLoading"], json!(false));
    assert_eq!(cards["7"]["state"], json!(3));
    // Server-pushed data from the second reply.
    assert_eq!(cards["8"]["state"], json!(2));
    assert!(out["store"].get("persistedRequests").is_none()
        || out["store"]["persistedRequests"] == json!({}));
}

#[test]
fn simulate_text_lists_outcomes() {
    onyx()
        .args(["simulate", "demos/replacement_card.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "RequestReplacementExpensifyCard: failed, network error: offline",
        ))
        .stdout(predicate::str::contains("success (jsonCode 200)"))
        .stdout(predicate::str::contains("cardList = "));
}

#[test]
fn simulate_conflict_rolls_back_optimistic_add() {
    let dir = TempDir::new().unwrap();
    let scenario = write_json(
        &dir,
        "scenario.json",
        &json!({
            "responses": [{"jsonCode": 404, "message": "Report not found"}],
            "mutations": [{
                "name": "AddComment",
                "params": {"reportID": 1, "text": "hi"},
                "optimisticData": [{"onyxMethod": "merge", "key": "reportAction_9",
                                    "value": {"text": "hi", "pendingAction": "add"}}],
                "failureData": [{"onyxMethod": "merge", "key": "reportAction_9", "value": null}]
            }]
        }),
    );

    let assert = onyx()
        .args(["--output", "json", "simulate"])
        .arg(&scenario)
        .assert()
        .success();

    let out: Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(out["outcomes"][0]["kind"], json!("conflict"));
    assert!(out["store"].get("reportAction_9").is_none());
}

#[test]
fn simulate_persists_to_store_file() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("out.json");

    onyx()
        .args(["--quiet", "simulate", "demos/replacement_card.json", "--store"])
        .arg(&store)
        .assert()
        .success();

    let saved = read_json(&store);
    assert_eq!(saved["cardList"]["7"]["state"], json!(3));
}

#[test]
fn simulate_invalid_mutation_exits_1() {
    let dir = TempDir::new().unwrap();
    let scenario = write_json(
        &dir,
        "bad.json",
        &json!({"mutations": [{"name": "not a command"}]}),
    );

    onyx()
        .arg("simulate")
        .arg(&scenario)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid mutation"));
}

#[test]
fn simulate_malformed_scenario_exits_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    onyx()
        .arg("simulate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid scenario"));
}

// ──────────────────────────────────────────────
// 4. Replay
// ──────────────────────────────────────────────

#[test]
fn replay_without_endpoint_exits_1() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    onyx()
        .arg("replay")
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no endpoint"));
}

#[test]
fn replay_with_empty_queue_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(&dir);

    onyx()
        .arg("replay")
        .arg(&store)
        .args(["--endpoint", "http://127.0.0.1:9/api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no persisted requests"));
}

#[test]
fn replay_unreachable_server_settles_as_failure() {
    let dir = TempDir::new().unwrap();
    let store = write_json(
        &dir,
        "store.json",
        &json!({
            "report_1": {"reportName": "New", "pendingAction": "update"},
            "persistedRequests": {
                "0": {
                    "id": 0,
                    "mutation": {
                        "name": "RenameReport",
                        "params": {"reportID": 1, "name": "New"},
                        "optimisticData": [{"onyxMethod": "merge", "key": "report_1",
                                            "value": {"reportName": "New", "pendingAction": "update"}}],
                        "failureData": [{"onyxMethod": "merge", "key": "report_1",
                                         "value": {"reportName": "Old"}}]
                    }
                }
            }
        }),
    );
    let config = dir.path().join("onyx.toml");
    fs::write(&config, "[queue]\nmax_retries = 0\n").unwrap();

    onyx()
        .arg("--config")
        .arg(&config)
        .arg("replay")
        .arg(&store)
        .args(["--endpoint", "http://127.0.0.1:9/api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 replayed, 1 failed"));

    let saved = read_json(&store);
    assert_eq!(saved["report_1"]["reportName"], json!("Old"));
    assert!(saved["report_1"].get("pendingAction").is_none());
    assert!(saved["report_1"]["errors"].as_object().is_some_and(|e| e.len() == 1));
    assert!(saved.get("persistedRequests").is_none() || saved["persistedRequests"] == json!({}));
}

// ──────────────────────────────────────────────
// 5. Config
// ──────────────────────────────────────────────

#[test]
fn config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    let mut cmd = onyx();
    cmd.current_dir(dir.path());
    cmd.arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue.max_retries      3"))
        .stdout(predicate::str::contains("draft.debounce_ms      1000"))
        .stdout(predicate::str::contains("queue.auth_token       (unset)"));
}

#[test]
fn config_token_falls_back_to_env_and_stays_hidden() {
    let dir = TempDir::new().unwrap();
    let mut cmd = onyx();
    cmd.current_dir(dir.path());
    cmd.env("ONYX_AUTH_TOKEN", "s3cret")
        .args(["--output", "json", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authToken\": true"))
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn config_rejects_unknown_fields() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("onyx.toml");
    fs::write(&config, "[queue]\nretries = 3\n").unwrap();

    onyx()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config error"));
}
