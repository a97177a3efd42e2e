//! Timer services driving debounced draft writes.
//!
//! - [`TokioTimer`] sleeps on the tokio runtime
//! - [`ManualTimer`] fires only when [`ManualTimer::advance`] moves its clock,
//!   which makes debounce behavior deterministic in tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

/// A task scheduled to run once.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot tasks.
pub trait TimerService: Send + Sync + 'static {
    /// Run `task` once after `delay`, unless the returned handle is cancelled first.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

/// Cancels a scheduled task. Dropping the handle does NOT cancel it.
pub struct TimerHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Guarantee the task will not run if it has not started yet.
    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle").finish_non_exhaustive()
    }
}

// ──────────────────────────────────────────────
// TokioTimer
// ──────────────────────────────────────────────

/// Timer backed by `tokio::time::sleep` on a captured runtime handle.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    runtime: Handle,
}

impl TokioTimer {
    /// Capture the current runtime. Panics outside a tokio runtime, like
    /// `tokio::spawn`.
    pub fn new() -> Self {
        Self {
            runtime: Handle::current(),
        }
    }

    pub fn with_handle(runtime: Handle) -> Self {
        Self { runtime }
    }
}

impl TimerService for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
        let abort = join.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}

// ──────────────────────────────────────────────
// ManualTimer
// ──────────────────────────────────────────────

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    /// (due time, sequence) → task
    pending: BTreeMap<(Duration, u64), TimerTask>,
}

/// Deterministic timer for tests: tasks run only inside [`advance`](Self::advance).
#[derive(Clone, Default)]
pub struct ManualTimer {
    clock: Arc<Mutex<ManualClock>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the timer was created.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Tasks scheduled and not yet run or cancelled.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward by `by`, running every task that falls due,
    /// in due order. Tasks scheduled by running tasks also run if they fall
    /// due within the window.
    pub fn advance(&self, by: Duration) {
        let target = self.lock().now + by;
        loop {
            let task = {
                let mut clock = self.lock();
                let due = clock
                    .pending
                    .keys()
                    .next()
                    .copied()
                    .filter(|(at, _)| *at <= target);
                match due {
                    Some(key) => {
                        clock.now = key.0;
                        clock.pending.remove(&key)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualClock> {
        self.clock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimer")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}

impl TimerService for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let key = {
            let mut clock = self.lock();
            let key = (clock.now + delay, clock.next_seq);
            clock.next_seq += 1;
            clock.pending.insert(key, task);
            key
        };
        let clock = Arc::downgrade(&self.clock);
        TimerHandle::new(move || {
            if let Some(clock) = clock.upgrade() {
                clock
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .pending
                    .remove(&key);
            }
        })
    }
}
