//! Text and JSON rendering shared by the subcommands.

use std::collections::BTreeMap;

use onyx_dispatch::{MutationError, MutationId, Outcome};
use onyx_store::StoreEntry;
use serde_json::{json, Value};

use crate::OutputFormat;

/// A mutation together with how it settled.
pub(crate) struct Settled {
    pub id: MutationId,
    pub command: String,
    pub outcome: Outcome,
}

impl Settled {
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Outcome::Success(response) => json!({
                "id": self.id,
                "command": self.command,
                "status": "success",
                "jsonCode": response.json_code,
            }),
            Outcome::Failure(error) => json!({
                "id": self.id,
                "command": self.command,
                "status": "failure",
                "kind": error_kind(error),
                "message": error.message(),
            }),
        }
    }

    pub fn to_text(&self) -> String {
        match &self.outcome {
            Outcome::Success(response) => format!(
                "#{} {}: success (jsonCode {})",
                self.id, self.command, response.json_code
            ),
            Outcome::Failure(error) => format!("#{} {}: failed, {}", self.id, self.command, error),
        }
    }
}

fn error_kind(error: &MutationError) -> &'static str {
    match error {
        MutationError::Validation { .. } => "validation",
        MutationError::Network { .. } => "network",
        MutationError::Conflict { .. } => "conflict",
    }
}

/// One line per entry: `key = value`, followed by pending/error markers.
pub(crate) fn entry_line(key: &str, value: &Value) -> String {
    let entry = StoreEntry::from_value(key, value.clone());
    let mut line = format!("{} = {}", key, value);
    if let Some(action) = entry.pending_action {
        line.push_str(&format!("  [pending {}]", format!("{:?}", action).to_lowercase()));
    }
    if let Some(error) = entry.latest_error() {
        line.push_str(&format!("  [error: {}]", error));
    }
    line
}

pub(crate) fn print_entries(entries: &BTreeMap<String, Value>, output: OutputFormat) {
    match output {
        OutputFormat::Text => {
            for (key, value) in entries {
                println!("{}", entry_line(key, value));
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(entries).unwrap_or_default()
            );
        }
    }
}
