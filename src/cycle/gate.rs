use std::sync::{Arc, Condvar, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cycle::machine::Inner;
use crate::cycle::state::CycleState;
use crate::timer::TimerKey;
use crate::transport::{ExpireFn, Transport};

/// The timing primitive behind a suspension, in both transport disciplines.
///
/// Non-blocking transports get a cancellable timeout task registered with
/// the container's scheduler; blocking transports park the suspending
/// thread in [`TimeoutGate::blocking_wait`] instead. Resume-side wakeups go
/// through [`TimeoutGate::wake`], which notifies the parked thread or asks
/// the container to schedule pipeline re-entry as appropriate.
pub(crate) struct TimeoutGate {
    transport: Arc<dyn Transport>,
    wakeup: Condvar,
}

impl TimeoutGate {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            wakeup: Condvar::new(),
        }
    }

    pub(crate) fn is_blocking(&self) -> bool {
        self.transport.is_blocking()
    }

    /// Registers the timeout task for a parked non-blocking suspension.
    /// Callers skip this entirely for a zero budget.
    pub(crate) fn arm(&self, key: TimerKey, after: Duration, expire: ExpireFn) {
        self.transport.schedule_timeout(key, after, expire);
    }

    /// Cancels a pending timeout. Safe to call redundantly from any thread,
    /// including when nothing was ever armed. Also nudges the monitor so a
    /// parked blocking thread re-checks its deadline.
    pub(crate) fn cancel(&self, key: TimerKey) {
        if !self.is_blocking() {
            self.transport.cancel_timeout(key);
        }
        self.wakeup.notify_all();
    }

    /// Resume-side wakeup: notify a parked blocking thread, or ask the
    /// container to re-enter the pipeline for a non-blocking slot.
    pub(crate) fn wake(&self) {
        self.wakeup.notify_all();
        if !self.is_blocking() {
            self.transport.schedule_dispatch();
        }
    }

    /// Parks the calling thread until the cycle leaves `Suspended` or the
    /// budget elapses. Remaining time is recomputed after every wakeup, so
    /// spurious wakeups and early notifies just re-enter the wait. A zero
    /// budget waits indefinitely.
    ///
    /// The guard is released for the duration of each wait and re-held on
    /// return; the caller still owns the post-wait transition.
    pub(crate) fn blocking_wait<'a>(
        &self,
        mut guard: MutexGuard<'a, Inner>,
        budget: Duration,
    ) -> MutexGuard<'a, Inner> {
        if budget.is_zero() {
            while guard.state == CycleState::Suspended {
                guard = self
                    .wakeup
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            return guard;
        }

        let deadline = Instant::now() + budget;
        while guard.state == CycleState::Suspended {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (g, _) = self
                .wakeup
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = g;
        }
        guard
    }
}
