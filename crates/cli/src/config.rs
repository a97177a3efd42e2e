//! `onyx.toml` configuration.
//!
//! # Example
//!
//! ```toml
//! [store]
//! path = "onyx-store.json"
//!
//! [queue]
//! endpoint = "https://www.example.com/api"
//! max_retries = 3
//! retry_backoff_ms = 100
//! auth_token = "..."
//!
//! [draft]
//! debounce_ms = 1000
//! max_length = 10000
//! ```
//!
//! Every section and field is optional. Command-line flags override file
//! values; `ONYX_AUTH_TOKEN` supplies the token when the file does not.
//!
//! No command edits drafts. `[draft]` is read for applications that embed
//! `onyx_draft::DraftManager` and share this file; the CLI only validates it
//! and shows it through `onyx config`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use onyx_dispatch::transport::AUTH_TOKEN_ENV;
use onyx_dispatch::RetryPolicy;
use onyx_draft::DraftConfig;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "onyx.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct OnyxConfig {
    pub store: StoreSection,
    pub queue: QueueSection,
    pub draft: DraftSection,
}

/// `[store]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StoreSection {
    /// Persisted store file used when a command is not given one.
    pub path: Option<PathBuf>,
}

/// `[queue]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct QueueSection {
    pub endpoint: Option<String>,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub auth_token: Option<String>,
}

impl Default for QueueSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            endpoint: None,
            max_retries: retry.max_retries,
            retry_backoff_ms: retry.backoff.as_millis() as u64,
            auth_token: None,
        }
    }
}

impl QueueSection {
    /// The configured token, else `ONYX_AUTH_TOKEN`.
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token
            .clone()
            .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok())
            .filter(|token| !token.is_empty())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// `[draft]`: settings for an embedded `DraftManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DraftSection {
    pub debounce_ms: u64,
    pub max_length: usize,
}

impl Default for DraftSection {
    fn default() -> Self {
        let draft = DraftConfig::default();
        Self {
            debounce_ms: draft.debounce.as_millis() as u64,
            max_length: draft.max_length,
        }
    }
}

impl DraftSection {
    pub fn draft_config(&self) -> DraftConfig {
        DraftConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            max_length: self.max_length,
        }
    }
}

/// Read and parse a config file.
pub(crate) fn read_config(path: &Path) -> Result<OnyxConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Load the config named by `--config`, else `onyx.toml` if present, else defaults.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<OnyxConfig, String> {
    match explicit {
        Some(path) => read_config(path),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config(default)
            } else {
                Ok(OnyxConfig::default())
            }
        }
    }
}
