//! The narrow interface a request cycle consumes from its connection.

use std::time::Duration;

use crate::timer::TimerKey;

/// Callback handed to the container's scheduler; invoked at most once, when
/// the timeout elapses without being cancelled.
pub type ExpireFn = Box<dyn FnOnce() + Send + 'static>;

/// Container primitives driving one connection slot.
///
/// The transport kind is fixed per connection: blocking transports tie a
/// dedicated thread to the slot and park it inside `unhandle()`, so their
/// timer methods are never called and may be no-ops. Non-blocking
/// transports must supply a real scheduler and honor
/// [`Transport::schedule_dispatch`] by re-entering the pipeline.
pub trait Transport: Send + Sync {
    /// Selects the gate discipline: in-process bounded wait vs scheduled
    /// timeout task.
    fn is_blocking(&self) -> bool;

    /// Re-enter the handler pipeline for this slot. Called after a parked
    /// non-blocking suspension is resumed or completed.
    fn schedule_dispatch(&self);

    /// Register a cancellable timeout task. `expire` must run on the
    /// container's own pool, never on the thread that armed it.
    fn schedule_timeout(&self, key: TimerKey, after: Duration, expire: ExpireFn);

    /// Remove a pending timeout task. Must be safe to call redundantly
    /// from any thread, including when nothing was armed or the task
    /// already fired.
    fn cancel_timeout(&self, key: TimerKey);
}
