use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use onyx_store::{LocalStore, StorePatch, PENDING_ACTION_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DispatchError, MutationError};
use crate::mutation::{Mutation, MutationId};
use crate::queue::{run_worker, Job, RetryPolicy, Settle};
use crate::reducer::reduce;
use crate::response::Outcome;
use crate::transport::Transport;

/// Store key holding requests that were written but have not settled yet,
/// as an object keyed by mutation id.
pub const PERSISTED_REQUESTS_KEY: &str = "persistedRequests";

/// Dispatcher configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub retry: RetryPolicy,
}

/// A written, unsettled mutation as stored under [`PERSISTED_REQUESTS_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRequest {
    pub id: MutationId,
    pub mutation: Mutation,
}

/// Read the persisted requests from the store, ordered by id.
///
/// Entries that do not decode are skipped with a warning.
pub fn persisted_requests(store: &LocalStore) -> Vec<PersistedRequest> {
    let Some(Value::Object(entries)) = store.get(PERSISTED_REQUESTS_KEY) else {
        return Vec::new();
    };

    let mut requests: Vec<PersistedRequest> = entries
        .into_iter()
        .filter_map(
            |(key, value)| match serde_json::from_value::<PersistedRequest>(value) {
                Ok(request) => Some(request),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping undecodable persisted request");
                    None
                }
            },
        )
        .collect();
    requests.sort_by_key(|r| r.id);
    requests
}

/// Handle to one written mutation.
#[derive(Debug)]
pub struct MutationHandle {
    id: MutationId,
    name: String,
    reply: oneshot::Receiver<Outcome>,
}

impl MutationHandle {
    pub fn id(&self) -> MutationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the mutation settles. The store has already been updated
    /// with the matching patch set by the time this returns.
    ///
    /// If the queue is shut down before the command was sent, this reports a
    /// network failure; the request stays persisted for [`MutationDispatcher::resume`].
    pub async fn settled(self) -> Outcome {
        self.reply.await.unwrap_or_else(|_| {
            Outcome::Failure(MutationError::Network {
                message: "command queue shut down before the mutation settled".to_string(),
            })
        })
    }
}

struct DispatchState {
    store: LocalStore,
    /// Key → the mutation whose optimistic data last set its `pendingAction`.
    ///
    /// Only touched from inside [`LocalStore::apply_with`], so every change
    /// here lands in the same store batch as the patches it describes.
    pending_owners: Mutex<HashMap<String, MutationId>>,
}

impl DispatchState {
    fn owners(&self) -> MutexGuard<'_, HashMap<String, MutationId>> {
        self.pending_owners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn claim_pending(&self, id: MutationId, mutation: &Mutation) {
        let mut owners = self.owners();
        for patch in mutation.optimistic_data() {
            let sets_pending = patch
                .value
                .get(PENDING_ACTION_FIELD)
                .is_some_and(|v| !v.is_null());
            if sets_pending {
                owners.insert(patch.key.clone(), id);
            }
        }
    }

    fn release_pending(&self, id: MutationId) -> Vec<String> {
        let mut owners = self.owners();
        let mut owned: Vec<String> = owners
            .iter()
            .filter(|(_, owner)| **owner == id)
            .map(|(key, _)| key.clone())
            .collect();
        owned.sort();
        for key in &owned {
            owners.remove(key);
        }
        owned
    }

    /// Claim `mutation`'s pending actions and apply `batch` in one store write.
    fn apply_optimistic(
        &self,
        id: MutationId,
        mutation: &Mutation,
        batch: Vec<StorePatch>,
    ) -> Result<(), DispatchError> {
        self.store.apply_with(|_| {
            self.claim_pending(id, mutation);
            batch
        })?;
        Ok(())
    }
}

impl Settle for DispatchState {
    fn settle(&self, id: MutationId, mutation: &Mutation, outcome: &Outcome) {
        match outcome {
            Outcome::Success(_) => info!(%id, command = mutation.name(), "mutation succeeded"),
            Outcome::Failure(e) => {
                warn!(%id, command = mutation.name(), error = %e, "mutation failed")
            }
        }

        let error_key = error_timestamp();
        let result = self.store.apply_with(|data| {
            let owned: Vec<String> = self
                .release_pending(id)
                .into_iter()
                .filter(|key| data.contains_key(key))
                .collect();
            let mut patches = reduce(mutation, outcome, &owned, &error_key);
            patches.push(request_patch(id, Value::Null));
            patches
        });
        if let Err(e) = result {
            warn!(%id, error = %e, "could not apply settle patches");
        }
    }
}

/// Microsecond timestamp used as the key of an attached error message.
fn error_timestamp() -> String {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    (nanos / 1_000).to_string()
}

fn request_patch(id: MutationId, value: Value) -> StorePatch {
    let mut entry = Map::new();
    entry.insert(id.to_string(), value);
    StorePatch::merge(PERSISTED_REQUESTS_KEY, Value::Object(entry))
}

/// Issues mutations: applies optimistic data, queues the command, and
/// settles the store when the server answers.
///
/// `MutationDispatcher` is a cloneable handle. It must be started inside a
/// tokio runtime because it spawns the queue's worker task.
///
/// ## Pending actions and errors
///
/// A mutation owns the `pendingAction` of every key its optimistic data sets
/// one on, until a later mutation sets it again. Ownership changes in the same
/// store batch as the optimistic data, and settling clears only keys the
/// mutation still owns, in the same batch as its settle patches.
///
/// On failure the error message is attached only to owned keys. A mutation
/// that sets no `pendingAction` gets no error on any entry; put an `errors`
/// field in its failure data to surface one.
#[derive(Clone)]
pub struct MutationDispatcher {
    state: Arc<DispatchState>,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Job>>>>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
    next_id: Arc<AtomicU64>,
    /// Ids below this were written by a previous session.
    resume_below: u64,
    resumed: Arc<AtomicBool>,
}

impl MutationDispatcher {
    /// Start the command queue worker over `transport`.
    pub fn start(store: LocalStore, transport: Arc<dyn Transport>, config: DispatchConfig) -> Self {
        let first_id = persisted_requests(&store)
            .last()
            .map(|r| r.id.0 + 1)
            .unwrap_or(0);

        let state = Arc::new(DispatchState {
            store,
            pending_owners: Mutex::new(HashMap::new()),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(rx, transport, config.retry, state.clone()));

        Self {
            state,
            sender: Arc::new(Mutex::new(Some(tx))),
            worker: Arc::new(Mutex::new(Some(worker))),
            next_id: Arc::new(AtomicU64::new(first_id)),
            resume_below: first_id,
            resumed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.state.store
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Job>, DispatchError> {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(DispatchError::QueueClosed)
    }

    /// Write a mutation.
    ///
    /// Validation runs first; a rejected mutation leaves the store untouched.
    /// Otherwise the optimistic data and the persisted request are applied as
    /// one batch before this returns, and the command is queued.
    pub fn write(&self, mutation: Mutation) -> Result<MutationHandle, DispatchError> {
        mutation.validate()?;
        let sender = self.sender()?;

        let id = MutationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = PersistedRequest {
            id,
            mutation: mutation.clone(),
        };
        let request_value = serde_json::to_value(&request).map_err(onyx_store::StoreError::from)?;

        let mut batch = mutation.optimistic_data().to_vec();
        batch.push(request_patch(id, request_value));
        self.state.apply_optimistic(id, &mutation, batch)?;

        debug!(%id, command = mutation.name(), "applied optimistic data");
        self.enqueue(&sender, id, mutation)
    }

    /// Re-apply and re-queue requests persisted by a previous session, in
    /// their original order. Optimistic patches are absolute, so re-applying
    /// them is safe. Only the first call does anything.
    pub fn resume(&self) -> Result<Vec<MutationHandle>, DispatchError> {
        if self.resumed.swap(true, Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        let sender = self.sender()?;

        let requests: Vec<PersistedRequest> = persisted_requests(&self.state.store)
            .into_iter()
            .filter(|r| r.id.0 < self.resume_below)
            .collect();
        if !requests.is_empty() {
            info!(count = requests.len(), "resuming persisted requests");
        }

        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            self.state.apply_optimistic(
                request.id,
                &request.mutation,
                request.mutation.optimistic_data().to_vec(),
            )?;
            handles.push(self.enqueue(&sender, request.id, request.mutation)?);
        }
        Ok(handles)
    }

    fn enqueue(
        &self,
        sender: &mpsc::UnboundedSender<Job>,
        id: MutationId,
        mutation: Mutation,
    ) -> Result<MutationHandle, DispatchError> {
        let (reply, rx) = oneshot::channel();
        let name = mutation.name().to_string();
        sender
            .send(Job {
                id,
                mutation: Arc::new(mutation),
                reply,
            })
            .map_err(|_| DispatchError::QueueClosed)?;
        debug!(%id, command = %name, "enqueued command");

        Ok(MutationHandle {
            id,
            name,
            reply: rx,
        })
    }

    /// Number of written mutations that have not settled yet.
    pub fn pending_count(&self) -> usize {
        match self.state.store.get(PERSISTED_REQUESTS_KEY) {
            Some(Value::Object(entries)) => entries.len(),
            _ => 0,
        }
    }

    /// Close the queue and wait for already-queued commands to settle.
    /// Further writes fail with [`DispatchError::QueueClosed`].
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "command queue worker ended abnormally");
            }
        }
    }
}
