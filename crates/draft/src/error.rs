use onyx_dispatch::DispatchError;
use onyx_store::StoreError;

use crate::manager::DraftState;

/// Errors returned by the draft manager.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// No draft exists for the owner key.
    #[error("no draft in progress for {owner_key}")]
    NoDraft { owner_key: String },

    /// The draft is mid-commit or mid-discard.
    #[error("draft for {owner_key} is {state:?}, expected Editing")]
    InvalidState { owner_key: String, state: DraftState },

    /// Content violates the length constraint; the draft stays in Editing.
    #[error("draft is {length} characters long, the maximum is {max}")]
    Validation { length: usize, max: usize },

    /// The owning mutation could not be dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
