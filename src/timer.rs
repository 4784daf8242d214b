//! Keyed, cancellable timeout scheduling for non-blocking transports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::transport::ExpireFn;

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identifies one timeout task in its owning queue. Keys are process-unique,
/// so a task can be cancelled and dropped without the queue ever holding a
/// reference back to the cycle that armed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey(u64);

impl TimerKey {
    pub fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

struct TimerTable {
    tasks: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
}

impl TimerTable {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TimerKey, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Timeout scheduler backed by the tokio runtime.
///
/// Each armed key spawns one sleep task; firing removes the key from the
/// table before the callback runs, and [`TimerQueue::cancel`] removes and
/// aborts it. Whichever side takes the entry first wins, so cancel is
/// idempotent and a cancelled task never invokes its callback.
#[derive(Clone)]
pub struct TimerQueue {
    handle: Handle,
    table: Arc<TimerTable>,
}

impl TimerQueue {
    /// Builds a queue on the current runtime. Panics outside a runtime;
    /// use [`TimerQueue::with_handle`] from plain threads.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            table: Arc::new(TimerTable {
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Arms `expire` to run after `after`, keyed for later cancellation.
    pub fn schedule(&self, key: TimerKey, after: Duration, expire: ExpireFn) {
        let table = Arc::clone(&self.table);
        // The table lock is held across spawn + insert so the task cannot
        // observe the table before its own handle is registered.
        let mut tasks = self.table.lock();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(after).await;
            let claimed = table.lock().remove(&key).is_some();
            if claimed {
                expire();
            }
        });
        if let Some(stale) = tasks.insert(key, task) {
            stale.abort();
        }
    }

    /// Cancels a pending key. No-op if the key was never scheduled or has
    /// already fired.
    pub fn cancel(&self, key: TimerKey) {
        if let Some(task) = self.table.lock().remove(&key) {
            task.abort();
            tracing::trace!(?key, "Timeout cancelled");
        }
    }

    /// Number of timeouts currently pending.
    pub fn pending(&self) -> usize {
        self.table.lock().len()
    }
}
