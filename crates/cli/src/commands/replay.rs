use std::path::Path;
use std::sync::Arc;

use onyx_dispatch::{persisted_requests, DispatchConfig, HttpTransport, MutationDispatcher};
use serde_json::{json, Value};
use tracing::info;

use super::{open_store, runtime, settle_all};
use crate::config::OnyxConfig;
use crate::render::Settled;
use crate::OutputFormat;

pub(crate) fn cmd_replay(
    path: &Path,
    endpoint: Option<String>,
    config: &OnyxConfig,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let endpoint = endpoint
        .or_else(|| config.queue.endpoint.clone())
        .ok_or_else(|| "no endpoint given and no [queue] endpoint configured".to_string())?;

    let store = open_store(path)?;
    let queued = persisted_requests(&store).len();
    info!(%endpoint, queued, "replaying persisted requests");

    let settled = if queued == 0 {
        Vec::new()
    } else {
        let transport = Arc::new(HttpTransport::new(endpoint, config.queue.auth_token()));
        let dispatch = DispatchConfig {
            retry: config.queue.retry_policy(),
        };
        let store = store.clone();
        runtime()?.block_on(async move {
            let dispatcher = MutationDispatcher::start(store, transport, dispatch);
            let handles = match dispatcher.resume() {
                Ok(handles) => handles,
                Err(e) => {
                    dispatcher.shutdown().await;
                    return Err(e.to_string());
                }
            };
            let settled = settle_all(handles).await;
            dispatcher.shutdown().await;
            Ok(settled)
        })?
    };

    let failed = settled.iter().filter(|s| !s.outcome.is_success()).count();
    match output {
        OutputFormat::Text => {
            if !quiet {
                for s in &settled {
                    println!("{}", s.to_text());
                }
            }
            if settled.is_empty() {
                println!("no persisted requests");
            } else {
                println!("{} replayed, {} failed", settled.len(), failed);
            }
        }
        OutputFormat::Json => {
            let outcomes: Vec<Value> = settled.iter().map(Settled::to_json).collect();
            let report = json!({
                "replayed": settled.len(),
                "failed": failed,
                "outcomes": outcomes,
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
    }

    store
        .teardown()
        .map_err(|e| format!("could not flush store: {}", e))
}
