use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::cycle::event::EventSnapshot;

/// Observer of a request cycle's suspension outcome.
///
/// Both methods default to no-ops so implementations override only the side
/// they care about. Invocation order is registration order, and a fault in
/// one listener never prevents delivery to the rest.
pub trait CycleListener: Send + Sync {
    fn on_timeout(&self, event: &EventSnapshot) {
        let _ = event;
    }

    fn on_complete(&self, event: &EventSnapshot) {
        let _ = event;
    }
}

/// Ordered, append-only registry of listeners for one request cycle.
/// Consumed (and reset) at recycle.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Arc<dyn CycleListener>>,
}

impl ListenerRegistry {
    pub fn add(&mut self, listener: Arc<dyn CycleListener>) {
        self.entries.push(listener);
    }

    /// Clone of the current registration order, for invocation outside the
    /// cycle lock.
    pub fn snapshot(&self) -> Vec<Arc<dyn CycleListener>> {
        self.entries.clone()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn notify_timeout(listeners: &[Arc<dyn CycleListener>], event: &EventSnapshot) {
    for listener in listeners {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_timeout(event))) {
            tracing::warn!(
                panic = panic_message(&payload),
                "Timeout listener panicked"
            );
        }
    }
}

pub(crate) fn notify_complete(listeners: &[Arc<dyn CycleListener>], event: &EventSnapshot) {
    for listener in listeners {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_complete(event))) {
            tracing::warn!(
                panic = panic_message(&payload),
                "Completion listener panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
