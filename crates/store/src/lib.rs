//! Local reactive store for optimistic client state.
//!
//! The store maps string keys to JSON values. All writes are expressed as
//! [`StorePatch`]es (deep merge or wholesale set) and are applied in batches:
//! patches in one batch apply in order and each subscriber hears about a key
//! at most once per batch. Persistence goes through a [`StorageProvider`].

pub mod conformance;
mod entry;
mod error;
pub mod key;
mod merge;
mod patch;
mod provider;
mod store;

pub use entry::{PendingAction, StoreEntry, ERRORS_FIELD, PENDING_ACTION_FIELD};
pub use error::StoreError;
pub use merge::merge_value;
pub use patch::{MergeStrategy, StorePatch};
pub use provider::{FileProvider, MemoryProvider, StorageProvider};
pub use store::{Batch, LocalStore, StoreConfig, SubscriptionId};
