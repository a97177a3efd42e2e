//! `onyx simulate`: run a scenario file's mutations against scripted replies.
//!
//! ```json
//! {
//!   "initial":   { "cardList": { "isLoading": false } },
//!   "responses": [ { "networkError": "offline" }, { "jsonCode": 200 } ],
//!   "mutations": [ { "name": "RequestReplacementExpensifyCard", "params": {...},
//!                    "optimisticData": [...], "successData": [...], "failureData": [...] } ]
//! }
//! ```
//!
//! Replies are consumed one per command in write order; retries are
//! disabled so every reply maps to exactly one mutation. Missing replies
//! succeed with `jsonCode` 200.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use onyx_dispatch::{
    DispatchConfig, Mutation, MutationDispatcher, RetryPolicy, ScriptedReply, ScriptedTransport,
};
use onyx_store::{LocalStore, StoreConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{open_store_with, runtime, settle_all};
use crate::render::{print_entries, Settled};
use crate::OutputFormat;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Scenario {
    /// Values for keys the store does not hold yet.
    #[serde(default)]
    initial: BTreeMap<String, Value>,
    #[serde(default)]
    responses: Vec<ScriptedReply>,
    mutations: Vec<Mutation>,
}

fn read_scenario(path: &Path) -> Result<Scenario, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("invalid scenario '{}': {}", path.display(), e))
}

pub(crate) fn cmd_simulate(
    scenario_path: &Path,
    store_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let scenario = read_scenario(scenario_path)?;

    let mut config = StoreConfig::default();
    for (key, value) in &scenario.initial {
        config = config.with_initial_state(key.clone(), value.clone());
    }
    let store = match store_path {
        Some(path) => open_store_with(path, config)?,
        None => LocalStore::init(config).map_err(|e| format!("could not create store: {}", e))?,
    };

    let settled = runtime()?.block_on(run(store.clone(), scenario))?;
    let snapshot = store.snapshot();

    match output {
        OutputFormat::Text => {
            if !quiet {
                for s in &settled {
                    println!("{}", s.to_text());
                }
                println!();
            }
            print_entries(&snapshot, output);
        }
        OutputFormat::Json => {
            let outcomes: Vec<Value> = settled.iter().map(Settled::to_json).collect();
            let report = json!({ "outcomes": outcomes, "store": snapshot });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
    }

    store
        .teardown()
        .map_err(|e| format!("could not flush store: {}", e))
}

async fn run(store: LocalStore, scenario: Scenario) -> Result<Vec<Settled>, String> {
    let transport = Arc::new(ScriptedTransport::new(scenario.responses));
    let dispatcher = MutationDispatcher::start(
        store,
        transport,
        DispatchConfig {
            retry: RetryPolicy::no_retry(),
        },
    );

    info!(mutations = scenario.mutations.len(), "running scenario");
    let mut handles = Vec::with_capacity(scenario.mutations.len());
    for mutation in scenario.mutations {
        match dispatcher.write(mutation) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                dispatcher.shutdown().await;
                return Err(e.to_string());
            }
        }
    }

    let settled = settle_all(handles).await;
    dispatcher.shutdown().await;
    Ok(settled)
}
