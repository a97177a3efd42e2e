use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::entry::StoreEntry;
use crate::error::StoreError;
use crate::key::is_collection_member;
use crate::patch::StorePatch;
use crate::provider::{MemoryProvider, StorageProvider};

type KeyCallback = Arc<dyn Fn(Option<&Value>) + Send + Sync>;
type CollectionCallback = Arc<dyn Fn(&str, Option<&Value>) + Send + Sync>;

/// Handle returned by [`LocalStore::subscribe`]; pass it to
/// [`LocalStore::unsubscribe`] to stop deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

enum Subscriber {
    Key { key: String, callback: KeyCallback },
    Collection { prefix: String, callback: CollectionCallback },
}

/// One pending delivery, collected under the lock and run outside it.
struct Notification {
    key: String,
    value: Option<Value>,
    target: NotificationTarget,
}

enum NotificationTarget {
    Key(KeyCallback),
    Collection(CollectionCallback),
}

impl Notification {
    fn deliver(self) {
        match self.target {
            NotificationTarget::Key(callback) => callback(self.value.as_ref()),
            NotificationTarget::Collection(callback) => callback(&self.key, self.value.as_ref()),
        }
    }
}

/// Store configuration passed to [`LocalStore::init`].
#[derive(Clone)]
pub struct StoreConfig {
    /// Values written to keys that are absent after loading, and restored by
    /// [`LocalStore::clear`].
    pub initial_key_states: BTreeMap<String, Value>,
    /// Persistence backend.
    pub provider: Arc<dyn StorageProvider>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_key_states: BTreeMap::new(),
            provider: Arc::new(MemoryProvider::new()),
        }
    }
}

impl StoreConfig {
    pub fn with_provider(mut self, provider: Arc<dyn StorageProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_initial_state(mut self, key: impl Into<String>, value: Value) -> Self {
        self.initial_key_states.insert(key.into(), value);
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("initial_key_states", &self.initial_key_states)
            .finish_non_exhaustive()
    }
}

/// Patches collected by [`LocalStore::batch`].
#[derive(Debug, Default)]
pub struct Batch {
    patches: Vec<StorePatch>,
}

impl Batch {
    pub fn merge(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.patches.push(StorePatch::merge(key, value));
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.patches.push(StorePatch::set(key, value));
        self
    }

    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.patches.push(StorePatch::remove(key));
        self
    }

    pub fn patch(&mut self, patch: StorePatch) -> &mut Self {
        self.patches.push(patch);
        self
    }
}

struct Inner {
    data: BTreeMap<String, Value>,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    next_subscription: u64,
    /// The thread delivering the current round of notifications, if any.
    notifying: Option<ThreadId>,
    /// Batches issued from inside callbacks, applied after the current round.
    deferred: VecDeque<Vec<StorePatch>>,
    torn_down: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    /// Signalled when a notification round ends.
    round_done: Condvar,
    provider: Arc<dyn StorageProvider>,
    initial_key_states: BTreeMap<String, Value>,
}

/// The local reactive store.
///
/// `LocalStore` is a cheap, cloneable handle; clones share one underlying
/// store. It is created explicitly with [`LocalStore::init`] and passed to its
/// consumers; there is no process-wide instance.
///
/// ## Batch Semantics
///
/// Every write is a batch of [`StorePatch`]es applied in order under one lock.
/// After the batch, each subscriber is notified at most once per changed key
/// with the key's final value. Keys whose final value equals their value
/// before the batch are not notified.
///
/// ## Reentrancy
///
/// Callbacks run outside the lock and may read the store freely. A write
/// issued from inside a callback is queued and applied once the current
/// round of notifications has finished, never recursively. A write from any
/// other thread blocks until that round ends and is applied before it
/// returns.
#[derive(Clone)]
pub struct LocalStore {
    shared: Arc<Shared>,
}

impl fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LocalStore")
            .field("keys", &inner.data.len())
            .field("subscribers", &inner.subscribers.len())
            .field("torn_down", &inner.torn_down)
            .finish()
    }
}

impl LocalStore {
    /// Load persisted state from the configured provider and seed initial key
    /// states for keys that are absent.
    pub fn init(config: StoreConfig) -> Result<Self, StoreError> {
        let mut data = config.provider.load_all()?;

        let mut seeded = Vec::new();
        for (key, value) in &config.initial_key_states {
            if !data.contains_key(key) && !value.is_null() {
                data.insert(key.clone(), value.clone());
                seeded.push((key.clone(), Some(value.clone())));
            }
        }
        if !seeded.is_empty() {
            config.provider.write_batch(&seeded)?;
        }

        debug!(keys = data.len(), seeded = seeded.len(), "store initialized");

        Ok(Self::from_parts(
            data,
            config.provider,
            config.initial_key_states,
        ))
    }

    /// An empty in-memory store.
    pub fn in_memory() -> Self {
        Self::from_parts(
            BTreeMap::new(),
            Arc::new(MemoryProvider::new()),
            BTreeMap::new(),
        )
    }

    fn from_parts(
        data: BTreeMap<String, Value>,
        provider: Arc<dyn StorageProvider>,
        initial_key_states: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    data,
                    subscribers: BTreeMap::new(),
                    next_subscription: 0,
                    notifying: None,
                    deferred: VecDeque::new(),
                    torn_down: false,
                }),
                round_done: Condvar::new(),
                provider,
                initial_key_states,
            }),
        }
    }

    /// Drop all subscribers and cached values, flush the provider, and reject
    /// all further writes.
    pub fn teardown(&self) -> Result<(), StoreError> {
        {
            let mut inner = self.lock();
            if inner.torn_down {
                return Ok(());
            }
            inner.torn_down = true;
            inner.subscribers.clear();
            inner.deferred.clear();
            inner.data.clear();
        }
        debug!("store torn down");
        self.shared.provider.flush()
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover data even if mutex was poisoned by a panic in a callback thread
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn get_entry(&self, key: &str) -> Option<StoreEntry> {
        self.get(key).map(|value| StoreEntry::from_value(key, value))
    }

    /// Every member of the collection `prefix`, keyed by full member key.
    pub fn get_collection(&self, prefix: &str) -> BTreeMap<String, Value> {
        self.lock()
            .data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| is_collection_member(key, prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().data.clone()
    }

    // ── Writes ───────────────────────────────────────────────────────────────

    pub fn merge(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        self.apply(vec![StorePatch::merge(key, value)])
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<(), StoreError> {
        self.apply(vec![StorePatch::set(key, value)])
    }

    pub fn remove(&self, key: impl Into<String>) -> Result<(), StoreError> {
        self.apply(vec![StorePatch::remove(key)])
    }

    /// Set several keys in one batch.
    pub fn multi_set(&self, values: BTreeMap<String, Value>) -> Result<(), StoreError> {
        self.apply(
            values
                .into_iter()
                .map(|(key, value)| StorePatch::set(key, value))
                .collect(),
        )
    }

    /// Merge several members of one collection in a single batch.
    ///
    /// Rejects the whole batch if any key is not a member of `prefix`.
    pub fn merge_collection(
        &self,
        prefix: &str,
        members: BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        if let Some(bad) = members.keys().find(|k| !is_collection_member(k, prefix)) {
            return Err(StoreError::InvalidCollectionMember {
                key: bad.clone(),
                prefix: prefix.to_string(),
            });
        }
        self.apply(
            members
                .into_iter()
                .map(|(key, value)| StorePatch::merge(key, value))
                .collect(),
        )
    }

    /// Build a batch with a closure and apply it.
    pub fn batch<F>(&self, build: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Batch),
    {
        let mut batch = Batch::default();
        build(&mut batch);
        self.apply(batch.patches)
    }

    /// Remove every key except `keys_to_preserve`, then restore initial key
    /// states. Subscribers of removed keys are notified with `None`.
    pub fn clear(&self, keys_to_preserve: &[&str]) -> Result<(), StoreError> {
        let keys: Vec<String> = self.lock().data.keys().cloned().collect();
        let mut patches = Vec::new();
        for key in keys {
            if keys_to_preserve.contains(&key.as_str()) {
                continue;
            }
            patches.push(StorePatch::remove(key));
        }
        for (key, value) in &self.shared.initial_key_states {
            if !keys_to_preserve.contains(&key.as_str()) {
                patches.push(StorePatch::set(key.clone(), value.clone()));
            }
        }
        self.apply(patches)
    }

    /// Apply a batch of patches in order and notify subscribers once per
    /// changed key.
    pub fn apply(&self, patches: Vec<StorePatch>) -> Result<(), StoreError> {
        self.apply_with(|_| patches)
    }

    /// Build a batch from the current data and apply it without letting
    /// another write in between.
    ///
    /// `build` runs under the store lock, so it must not call back into the
    /// store. Subscribers are notified after the lock is released. Called from
    /// inside a callback, `build` runs immediately and its patches are queued
    /// like any other write from a callback.
    pub fn apply_with<F>(&self, build: F) -> Result<(), StoreError>
    where
        F: FnOnce(&BTreeMap<String, Value>) -> Vec<StorePatch>,
    {
        let current = thread::current().id();
        let mut notifications = {
            let mut inner = self.lock();
            loop {
                if inner.torn_down {
                    return Err(StoreError::TornDown);
                }
                let notifying = inner.notifying;
                match notifying {
                    None => break,
                    Some(owner) if owner == current => {
                        let patches = build(&inner.data);
                        if !patches.is_empty() {
                            trace!(
                                patches = patches.len(),
                                "deferring write issued during notification"
                            );
                            inner.deferred.push_back(patches);
                        }
                        return Ok(());
                    }
                    Some(_) => {
                        inner = self
                            .shared
                            .round_done
                            .wait(inner)
                            .unwrap_or_else(|e| e.into_inner());
                    }
                }
            }

            let patches = build(&inner.data);
            if patches.is_empty() {
                return Ok(());
            }
            let changed = self.apply_locked(&mut inner, patches);
            inner.notifying = Some(current);
            collect_notifications(&inner, &changed)
        };

        let _round = RoundGuard { store: self };
        loop {
            for notification in notifications.drain(..) {
                notification.deliver();
            }

            let mut inner = self.lock();
            match inner.deferred.pop_front() {
                Some(next) if !inner.torn_down => {
                    let changed = self.apply_locked(&mut inner, next);
                    notifications = collect_notifications(&inner, &changed);
                }
                _ => return Ok(()),
            }
        }
    }

    /// Apply patches to the cached data and forward the result to the
    /// provider. Returns the keys whose value changed, in first-touch order.
    fn apply_locked(&self, inner: &mut Inner, patches: Vec<StorePatch>) -> Vec<String> {
        let mut touched: Vec<(String, Option<Value>)> = Vec::new();

        for patch in patches {
            let current = inner.data.remove(&patch.key);
            if !touched.iter().any(|(key, _)| *key == patch.key) {
                touched.push((patch.key.clone(), current.clone()));
            }
            if let Some(next) = patch.apply_to(current) {
                inner.data.insert(patch.key, next);
            }
        }

        let changes: Vec<(String, Option<Value>)> = touched
            .into_iter()
            .filter_map(|(key, before)| {
                let after = inner.data.get(&key).cloned();
                (after != before).then_some((key, after))
            })
            .collect();

        if changes.is_empty() {
            return Vec::new();
        }

        if let Err(e) = self.shared.provider.write_batch(&changes) {
            warn!(error = %e, keys = changes.len(), "failed to persist store batch");
        }
        debug!(keys = changes.len(), "applied store batch");

        changes.into_iter().map(|(key, _)| key).collect()
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    /// Subscribe to one key. The callback receives the current value
    /// immediately, then the new value after every batch that changes it.
    pub fn subscribe<F>(
        &self,
        key: impl Into<String>,
        callback: F,
    ) -> Result<SubscriptionId, StoreError>
    where
        F: Fn(Option<&Value>) + Send + Sync + 'static,
    {
        let key = key.into();
        let callback: KeyCallback = Arc::new(callback);

        let (id, current) = {
            let mut inner = self.lock();
            if inner.torn_down {
                return Err(StoreError::TornDown);
            }
            let id = SubscriptionId(inner.next_subscription);
            inner.next_subscription += 1;
            let current = inner.data.get(&key).cloned();
            inner.subscribers.insert(
                id,
                Subscriber::Key {
                    key,
                    callback: callback.clone(),
                },
            );
            (id, current)
        };

        callback(current.as_ref());
        Ok(id)
    }

    /// Subscribe to every member of the collection `prefix`. The callback
    /// receives `(member_key, value)`, first once per existing member, then
    /// after every batch that changes a member.
    pub fn subscribe_collection<F>(
        &self,
        prefix: impl Into<String>,
        callback: F,
    ) -> Result<SubscriptionId, StoreError>
    where
        F: Fn(&str, Option<&Value>) + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        let callback: CollectionCallback = Arc::new(callback);

        let id = {
            let mut inner = self.lock();
            if inner.torn_down {
                return Err(StoreError::TornDown);
            }
            let id = SubscriptionId(inner.next_subscription);
            inner.next_subscription += 1;
            inner.subscribers.insert(
                id,
                Subscriber::Collection {
                    prefix: prefix.clone(),
                    callback: callback.clone(),
                },
            );
            id
        };

        for (key, value) in self.get_collection(&prefix) {
            callback(&key, Some(&value));
        }
        Ok(id)
    }

    /// Stop deliveries for `id`. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }
}

/// Ends a notification round, even if a callback panicked, and wakes
/// writers waiting on other threads.
struct RoundGuard<'a> {
    store: &'a LocalStore,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.store.lock();
            inner.notifying = None;
            inner.deferred.clear();
        }
        self.store.shared.round_done.notify_all();
    }
}

fn collect_notifications(inner: &Inner, changed: &[String]) -> Vec<Notification> {
    let mut notifications = Vec::new();
    for key in changed {
        let value = inner.data.get(key).cloned();
        for subscriber in inner.subscribers.values() {
            let target = match subscriber {
                Subscriber::Key { key: k, callback } if k == key => {
                    NotificationTarget::Key(callback.clone())
                }
                Subscriber::Collection { prefix, callback }
                    if is_collection_member(key, prefix) =>
                {
                    NotificationTarget::Collection(callback.clone())
                }
                _ => continue,
            };
            notifications.push(Notification {
                key: key.clone(),
                value: value.clone(),
                target,
            });
        }
    }
    notifications
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
