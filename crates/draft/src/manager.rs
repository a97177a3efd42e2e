use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use onyx_dispatch::{Mutation, MutationDispatcher, MutationHandle};
use onyx_store::{LocalStore, StoreError};
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

use crate::content::{draft_key, Draft, DraftContent, PersistedDraft};
use crate::error::DraftError;
use crate::focus::{FocusState, FocusTarget};
use crate::timer::{TimerHandle, TimerService};

/// Default debounce interval between the last edit and its persistence.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Default maximum length of text content, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 10_000;

/// Lifecycle position of the draft for one owner key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    Editing,
    Committing,
    Discarding,
}

/// Draft manager configuration.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    /// Quiet period after the last edit before the draft is persisted.
    pub debounce: Duration,
    /// Maximum text length accepted by commit.
    pub max_length: usize,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

/// Result of [`DraftManager::commit_draft`].
#[derive(Debug)]
pub enum CommitOutcome {
    /// The owning mutation was dispatched; the draft is gone.
    Committed(MutationHandle),
    /// The content is blank. Nothing was dispatched and the draft is still
    /// being edited; the caller should ask whether to delete the entity.
    ConfirmDelete,
    /// The content equals the original. The draft was discarded without a mutation.
    Unchanged,
}

struct Slot {
    draft: Draft,
    original: DraftContent,
    state: DraftState,
    /// Bumped on every edit; a debounced write only lands if it still matches.
    generation: u64,
    /// Open order, used to pick the next editor to focus.
    opened: u64,
    pending: Option<TimerHandle>,
}

struct Inner {
    store: LocalStore,
    dispatcher: MutationDispatcher,
    timer: Arc<dyn TimerService>,
    config: DraftConfig,
    slots: Mutex<HashMap<String, Slot>>,
    focus: Mutex<FocusState>,
    /// Held while a draft key is written, together with the check that
    /// authorizes the write.
    writes: Mutex<()>,
    next_open: AtomicU64,
}

impl Inner {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_focus(&self) -> MutexGuard<'_, FocusState> {
        self.focus.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Debounce timer callback: persist the draft if no newer edit,
    /// commit or discard happened since the timer was armed.
    fn flush_if_current(&self, owner_key: &str, generation: u64) {
        let _write = self.lock_writes();
        let persisted = {
            let mut slots = self.lock_slots();
            match slots.get_mut(owner_key) {
                Some(slot) if slot.generation == generation && slot.state == DraftState::Editing => {
                    slot.pending = None;
                    PersistedDraft::new(&slot.draft, &slot.original)
                }
                _ => {
                    trace!(owner_key, generation, "dropping superseded draft write");
                    return;
                }
            }
        };

        if let Err(e) = self.persist(owner_key, &persisted) {
            warn!(owner_key, error = %e, "failed to persist draft");
        } else {
            debug!(owner_key, "persisted draft");
        }
    }

    fn persist(&self, owner_key: &str, persisted: &PersistedDraft) -> Result<(), StoreError> {
        let value = serde_json::to_value(persisted)?;
        self.store.set(draft_key(owner_key), value)
    }

    /// Drop the slot and hand focus to the most recently opened editor left,
    /// or back to the composer.
    fn close(&self, owner_key: &str) {
        let next = {
            let mut slots = self.lock_slots();
            slots.remove(owner_key);
            slots
                .iter()
                .filter(|(_, slot)| slot.state == DraftState::Editing)
                .max_by_key(|(_, slot)| slot.opened)
                .map(|(key, _)| key.clone())
        };
        self.lock_focus().end_edit(owner_key, next.as_deref());
    }

    fn reopen(&self, owner_key: &str) {
        if let Some(slot) = self.lock_slots().get_mut(owner_key) {
            slot.state = DraftState::Editing;
        }
    }

    fn open(&self, draft: Draft, original: DraftContent) -> Option<TimerHandle> {
        let owner_key = draft.owner_key.clone();
        let opened = self.next_open.fetch_add(1, Ordering::SeqCst);
        let previous = self.lock_slots().insert(
            owner_key.clone(),
            Slot {
                draft,
                original,
                state: DraftState::Editing,
                generation: 0,
                opened,
                pending: None,
            },
        );
        self.lock_focus().begin_edit(&owner_key);
        previous.and_then(|slot| slot.pending)
    }
}

fn ensure_editing(owner_key: &str, slot: &Slot) -> Result<(), DraftError> {
    if slot.state == DraftState::Editing {
        Ok(())
    } else {
        Err(DraftError::InvalidState {
            owner_key: owner_key.to_string(),
            state: slot.state,
        })
    }
}

fn no_draft(owner_key: &str) -> DraftError {
    DraftError::NoDraft {
        owner_key: owner_key.to_string(),
    }
}

/// Owns every draft in progress.
///
/// Drafts are persisted under [`draft_key`] after [`DraftConfig::debounce`]
/// of inactivity. Their content only reaches the permanent entity through the
/// mutation built at commit time.
///
/// Store subscribers of draft keys may read drafts from their callbacks but
/// must not commit or discard drafts from them.
#[derive(Clone)]
pub struct DraftManager {
    inner: Arc<Inner>,
}

impl DraftManager {
    pub fn new(
        store: LocalStore,
        dispatcher: MutationDispatcher,
        timer: Arc<dyn TimerService>,
        config: DraftConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                dispatcher,
                timer,
                config,
                slots: Mutex::new(HashMap::new()),
                focus: Mutex::new(FocusState::default()),
                writes: Mutex::new(()),
                next_open: AtomicU64::new(0),
            }),
        }
    }

    /// Start editing `owner_key` from `initial`, which is also remembered as
    /// the original content. An existing draft for the same owner is replaced.
    pub fn create_draft(&self, owner_key: &str, initial: impl Into<DraftContent>) -> Draft {
        let initial = initial.into();
        let draft = Draft {
            owner_key: owner_key.to_string(),
            content: initial.clone(),
            created_at: OffsetDateTime::now_utc(),
        };

        if let Some(stale) = self.inner.open(draft.clone(), initial) {
            debug!(owner_key, "replacing draft with a pending write");
            stale.cancel();
        }
        draft
    }

    /// Rebuild the draft for `owner_key` from its persisted form, e.g. after
    /// a restart. Returns the live draft if one is already open, and `None`
    /// if nothing (or nothing decodable) was persisted.
    pub fn restore(&self, owner_key: &str) -> Option<Draft> {
        if let Some(draft) = self.get(owner_key) {
            return Some(draft);
        }

        let value = self.inner.store.get(&draft_key(owner_key))?;
        let persisted: PersistedDraft = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!(owner_key, error = %e, "ignoring undecodable persisted draft");
                return None;
            }
        };

        let draft = Draft {
            owner_key: owner_key.to_string(),
            content: persisted.content.clone(),
            created_at: persisted.created_at(),
        };
        self.inner.open(draft.clone(), persisted.original);
        debug!(owner_key, "restored draft");
        Some(draft)
    }

    /// Replace the draft's content and (re)arm its debounced persistence.
    pub fn update_draft(
        &self,
        owner_key: &str,
        content: impl Into<DraftContent>,
    ) -> Result<Draft, DraftError> {
        let (draft, generation, superseded) = {
            let mut slots = self.inner.lock_slots();
            let slot = slots.get_mut(owner_key).ok_or_else(|| no_draft(owner_key))?;
            ensure_editing(owner_key, slot)?;
            slot.draft.content = content.into();
            slot.generation += 1;
            (slot.draft.clone(), slot.generation, slot.pending.take())
        };
        if let Some(superseded) = superseded {
            superseded.cancel();
        }

        let weak = Arc::downgrade(&self.inner);
        let owner = owner_key.to_string();
        let handle = self.inner.timer.schedule(
            self.inner.config.debounce,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush_if_current(&owner, generation);
                }
            }),
        );

        let orphan = {
            let mut slots = self.inner.lock_slots();
            match slots.get_mut(owner_key) {
                Some(slot) if slot.generation == generation && slot.state == DraftState::Editing => {
                    slot.pending = Some(handle);
                    None
                }
                _ => Some(handle),
            }
        };
        if let Some(orphan) = orphan {
            orphan.cancel();
        }

        Ok(draft)
    }

    /// Commit the draft through the mutation produced by `build`.
    ///
    /// - blank content → [`CommitOutcome::ConfirmDelete`], still Editing
    /// - text longer than `max_length` → [`DraftError::Validation`], still Editing
    /// - content equal to the original → [`CommitOutcome::Unchanged`], discarded
    /// - otherwise the latest content is flushed, the mutation is dispatched,
    ///   and the persisted draft is cleared
    ///
    /// If dispatching fails the draft returns to Editing with its content persisted.
    pub fn commit_draft<F>(&self, owner_key: &str, build: F) -> Result<CommitOutcome, DraftError>
    where
        F: FnOnce(&Draft) -> Mutation,
    {
        let _write = self.inner.lock_writes();

        let (draft, original, pending) = {
            let mut slots = self.inner.lock_slots();
            let slot = slots.get_mut(owner_key).ok_or_else(|| no_draft(owner_key))?;
            ensure_editing(owner_key, slot)?;

            if slot.draft.content.is_blank() {
                debug!(owner_key, "blank draft, asking for delete confirmation");
                return Ok(CommitOutcome::ConfirmDelete);
            }
            if let Some(length) = slot.draft.content.text_len() {
                let max = self.inner.config.max_length;
                if length > max {
                    return Err(DraftError::Validation { length, max });
                }
            }

            let unchanged = slot.draft.content == slot.original;
            slot.state = if unchanged {
                DraftState::Discarding
            } else {
                DraftState::Committing
            };
            slot.generation += 1;
            (slot.draft.clone(), slot.original.clone(), slot.pending.take())
        };
        if let Some(pending) = pending {
            pending.cancel();
        }

        let key = draft_key(owner_key);

        if draft.content == original {
            let cleared = self.inner.store.remove(key);
            self.inner.close(owner_key);
            cleared?;
            debug!(owner_key, "draft unchanged, nothing to commit");
            return Ok(CommitOutcome::Unchanged);
        }

        let mutation = build(&draft);
        if let Err(e) = mutation.validate() {
            self.inner.reopen(owner_key);
            return Err(e.into());
        }

        if let Err(e) = self
            .inner
            .persist(owner_key, &PersistedDraft::new(&draft, &original))
        {
            self.inner.reopen(owner_key);
            return Err(e.into());
        }

        match self.inner.dispatcher.write(mutation) {
            Ok(handle) => {
                let cleared = self.inner.store.remove(key);
                self.inner.close(owner_key);
                cleared?;
                debug!(owner_key, mutation = %handle.id(), "committed draft");
                Ok(CommitOutcome::Committed(handle))
            }
            Err(e) => {
                warn!(owner_key, error = %e, "could not dispatch draft mutation");
                self.inner.reopen(owner_key);
                Err(e.into())
            }
        }
    }

    /// Drop the draft without dispatching anything. The permanent entity is
    /// untouched.
    pub fn discard_draft(&self, owner_key: &str) -> Result<(), DraftError> {
        let _write = self.inner.lock_writes();

        let pending = {
            let mut slots = self.inner.lock_slots();
            let slot = slots.get_mut(owner_key).ok_or_else(|| no_draft(owner_key))?;
            ensure_editing(owner_key, slot)?;
            slot.state = DraftState::Discarding;
            slot.generation += 1;
            slot.pending.take()
        };
        if let Some(pending) = pending {
            pending.cancel();
        }

        let cleared = self.inner.store.remove(draft_key(owner_key));
        self.inner.close(owner_key);
        debug!(owner_key, "discarded draft");
        cleared.map_err(Into::into)
    }

    /// The draft in progress for `owner_key`, if any.
    pub fn get(&self, owner_key: &str) -> Option<Draft> {
        self.inner
            .lock_slots()
            .get(owner_key)
            .map(|slot| slot.draft.clone())
    }

    pub fn state(&self, owner_key: &str) -> DraftState {
        self.inner
            .lock_slots()
            .get(owner_key)
            .map(|slot| slot.state)
            .unwrap_or(DraftState::Empty)
    }

    /// Owner keys of every draft being edited.
    pub fn editing(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock_slots()
            .iter()
            .filter(|(_, slot)| slot.state == DraftState::Editing)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn focus(&self) -> FocusTarget {
        self.inner.lock_focus().target.clone()
    }

    pub fn composer_visible(&self) -> bool {
        self.inner.lock_focus().composer_visible
    }

    /// The user tapped the main composer.
    pub fn focus_composer(&self) {
        self.inner.lock_focus().focus_composer();
    }
}
