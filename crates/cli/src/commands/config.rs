use serde_json::json;

use crate::config::OnyxConfig;
use crate::OutputFormat;

/// Print the configuration after defaults and the token fallback are applied.
/// The token itself is never printed.
pub(crate) fn cmd_config(config: &OnyxConfig, output: OutputFormat) -> Result<(), String> {
    let retry = config.queue.retry_policy();
    let draft = config.draft.draft_config();
    let store_path = config
        .store
        .path
        .as_ref()
        .map(|p| p.display().to_string());
    let token_set = config.queue.auth_token().is_some();

    match output {
        OutputFormat::Text => {
            println!("store.path             {}", store_path.as_deref().unwrap_or("(unset)"));
            println!(
                "queue.endpoint         {}",
                config.queue.endpoint.as_deref().unwrap_or("(unset)")
            );
            println!("queue.max_retries      {}", retry.max_retries);
            println!("queue.retry_backoff_ms {}", retry.backoff.as_millis());
            println!(
                "queue.auth_token       {}",
                if token_set { "(set)" } else { "(unset)" }
            );
            println!("draft.debounce_ms      {}", draft.debounce.as_millis());
            println!("draft.max_length       {}", draft.max_length);
        }
        OutputFormat::Json => {
            let report = json!({
                "store": { "path": store_path },
                "queue": {
                    "endpoint": config.queue.endpoint,
                    "maxRetries": retry.max_retries,
                    "retryBackoffMs": retry.backoff.as_millis() as u64,
                    "authToken": token_set,
                },
                "draft": {
                    "debounceMs": draft.debounce.as_millis() as u64,
                    "maxLength": draft.max_length,
                },
            });
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_default());
        }
    }
    Ok(())
}
