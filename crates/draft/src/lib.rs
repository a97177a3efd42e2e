//! Drafts: transient edit state layered over the local store.
//!
//! A draft moves through `Empty → Editing → {Committing, Discarding} → Empty`.
//! While editing, content is persisted under `draft_<owner>` after a debounce
//! interval; committing turns the content into a mutation, discarding drops
//! it. Only one editor holds input focus at a time.

mod content;
mod error;
mod focus;
mod manager;
pub mod timer;

pub use content::{draft_key, Draft, DraftContent, DRAFT_PREFIX};
pub use error::DraftError;
pub use focus::FocusTarget;
pub use manager::{CommitOutcome, DraftConfig, DraftManager, DraftState};
pub use timer::{ManualTimer, TimerHandle, TimerService, TokioTimer};
