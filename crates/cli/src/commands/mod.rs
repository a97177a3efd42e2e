pub(crate) mod config;
pub(crate) mod inspect;
pub(crate) mod replay;
pub(crate) mod simulate;

use std::path::Path;
use std::sync::Arc;

use onyx_dispatch::MutationHandle;
use onyx_store::{FileProvider, LocalStore, StoreConfig};

use crate::render::Settled;

/// Open an existing store file.
pub(crate) fn open_store(path: &Path) -> Result<LocalStore, String> {
    if !path.is_file() {
        return Err(format!("store file not found: {}", path.display()));
    }
    open_store_with(path, StoreConfig::default())
}

/// Open (or create) a store file with `config`'s initial key states.
pub(crate) fn open_store_with(path: &Path, config: StoreConfig) -> Result<LocalStore, String> {
    let provider = FileProvider::open(path)
        .map_err(|e| format!("could not open '{}': {}", path.display(), e))?;
    LocalStore::init(config.with_provider(Arc::new(provider)))
        .map_err(|e| format!("could not load '{}': {}", path.display(), e))
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("could not start async runtime: {}", e))
}

/// Wait for every handle, in write order.
pub(crate) async fn settle_all(handles: Vec<MutationHandle>) -> Vec<Settled> {
    let mut settled = Vec::with_capacity(handles.len());
    for handle in handles {
        let id = handle.id();
        let command = handle.name().to_string();
        let outcome = handle.settled().await;
        settled.push(Settled {
            id,
            command,
            outcome,
        });
    }
    settled
}
