use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::config::{CycleConfig, TimeoutAction};
use crate::cycle::event::{EventSnapshot, HandlerContext};
use crate::cycle::gate::TimeoutGate;
use crate::cycle::listener::{self, CycleListener, ListenerRegistry};
use crate::cycle::state::CycleState;
use crate::message::request::Request;
use crate::message::response::SharedResponse;
use crate::transport::Transport;

/// Contract violation: an operation was invoked in a state where the
/// transition table declares it illegal. Signals that the embedding
/// pipeline is broken; never retried or swallowed by the core.
#[derive(Debug, thiserror::Error)]
#[error("{operation} is illegal while the cycle is {state}")]
pub struct CycleError {
    operation: &'static str,
    state: CycleState,
}

impl CycleError {
    fn new(operation: &'static str, state: CycleState) -> Self {
        Self { operation, state }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn state(&self) -> CycleState {
        self.state
    }
}

pub(crate) struct Inner {
    pub(crate) state: CycleState,
    initial: bool,
    timeout: Duration,
    event: Option<EventSnapshot>,
    listeners: ListenerRegistry,
}

/// The request-continuation state machine for one connection slot.
///
/// Allocated once per slot and reused across logical requests via
/// [`RequestCycle::recycle`]. All transitions run under one exclusive lock;
/// listener callbacks and the container's scheduling primitives are always
/// invoked with the lock released.
pub struct RequestCycle {
    inner: Mutex<Inner>,
    gate: TimeoutGate,
    default_timeout: Duration,
    on_timeout: TimeoutAction,
    // Handed to timeout tasks instead of an owning back-reference, so a
    // task outliving its slot upgrades to nothing rather than keeping the
    // cycle alive.
    weak_self: Weak<RequestCycle>,
}

impl RequestCycle {
    pub fn new(transport: Arc<dyn Transport>, config: CycleConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            inner: Mutex::new(Inner {
                state: CycleState::Idle,
                initial: true,
                timeout: config.default_timeout(),
                event: None,
                listeners: ListenerRegistry::default(),
            }),
            gate: TimeoutGate::new(transport),
            default_timeout: config.default_timeout(),
            on_timeout: config.on_timeout,
            weak_self: weak_self.clone(),
        })
    }

    // Poisoning only means a panic escaped mid-transition; the state word
    // itself is always coherent, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begins a dispatch pass.
    ///
    /// From `Idle` this starts the original pass. From `Suspended` or
    /// `Unsuspending` it resolves a pending resume into `Redispatched` and
    /// cancels any pending timeout.
    pub fn handling(&self) -> Result<(), CycleError> {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Idle => {
                inner.initial = true;
                inner.state = CycleState::Dispatched;
                Ok(())
            }
            CycleState::Suspended | CycleState::Unsuspending => {
                self.cancel_timeout_locked(&mut inner);
                inner.state = CycleState::Redispatched;
                Ok(())
            }
            state => Err(CycleError::new("handling", state)),
        }
    }

    /// Suspends the current pass, installing the [`EventSnapshot`].
    ///
    /// Legal from `Dispatched`/`Redispatched`; a repeat call while already
    /// `Suspending`/`Redispatching` refreshes the existing snapshot instead
    /// of installing a second one.
    pub fn suspend(
        &self,
        context: HandlerContext,
        request: Arc<Request>,
        response: Arc<SharedResponse>,
    ) -> Result<(), CycleError> {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Dispatched | CycleState::Redispatched => {
                tracing::debug!(context = context.name(), "Cycle suspending");
                inner.event = Some(EventSnapshot::new(context, request, response));
                inner.state = CycleState::Suspending;
                Ok(())
            }
            CycleState::Suspending | CycleState::Redispatching => {
                if let Some(event) = &mut inner.event {
                    event.reinstall(context, request, response);
                }
                Ok(())
            }
            state => Err(CycleError::new("suspend", state)),
        }
    }

    /// Called by the connection when the handler pipeline returns control.
    ///
    /// Returns `true` when this pass is finished and the container may
    /// release the thread or turn; `false` when a resume already happened
    /// and the container must immediately re-invoke the pipeline.
    ///
    /// From `Suspending` this is where the timeout engages: the pass stops
    /// being initial, the budget is armed, and on blocking transports the
    /// calling thread parks here until resumed, expired or cancelled.
    pub fn unhandle(&self) -> Result<bool, CycleError> {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Dispatched | CycleState::Redispatched | CycleState::Completing => {
                inner.state = CycleState::Uncompleted;
                Ok(true)
            }
            CycleState::Redispatching => {
                // The pass that follows is a resumed dispatch even though
                // the suspension never parked.
                inner.initial = false;
                inner.state = CycleState::Redispatched;
                Ok(false)
            }
            CycleState::Suspending => {
                inner.initial = false;
                let budget = inner.timeout;
                if self.gate.is_blocking() {
                    inner.state = CycleState::Suspended;
                    inner = self.gate.blocking_wait(inner, budget);
                    if inner.state == CycleState::Suspended {
                        // Deadline elapsed with no resume; expire on this
                        // thread, outside the lock.
                        drop(inner);
                        self.expired();
                        inner = self.lock();
                    }
                    match inner.state {
                        CycleState::Unsuspending => {
                            inner.state = CycleState::Redispatched;
                            Ok(false)
                        }
                        CycleState::Completing => {
                            inner.state = CycleState::Uncompleted;
                            Ok(true)
                        }
                        CycleState::Complete => Ok(true),
                        state => {
                            tracing::warn!(state = %state, "Unexpected state after suspension wait");
                            Ok(true)
                        }
                    }
                } else {
                    if let Some(event) = &inner.event {
                        if !budget.is_zero() {
                            let key = event.timer_key();
                            let cycle = self.weak_self.clone();
                            self.gate.arm(
                                key,
                                budget,
                                Box::new(move || {
                                    if let Some(cycle) = cycle.upgrade() {
                                        cycle.expired();
                                    }
                                }),
                            );
                        }
                    }
                    inner.state = CycleState::Suspended;
                    Ok(true)
                }
            }
            state => Err(CycleError::new("unhandle", state)),
        }
    }

    /// Resumes a suspension. Cancels the pending timeout, then either flags
    /// an in-pass redispatch (`Suspending`) or wakes the parked slot
    /// (`Suspended`). Redundant calls are silent no-ops.
    pub fn dispatch(&self) {
        self.resume(None, None);
    }

    /// Resume with an explicit target context and path for the re-entered
    /// pipeline.
    pub fn dispatch_to(&self, context: HandlerContext, path: impl Into<String>) {
        self.resume(Some(context), Some(path.into()));
    }

    /// Resume, rerouting the re-entered pipeline to `path` within the
    /// suspended context.
    pub fn dispatch_path(&self, path: impl Into<String>) {
        self.resume(None, Some(path.into()));
    }

    fn resume(&self, context: Option<HandlerContext>, path: Option<String>) {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Suspending => {
                self.cancel_timeout_locked(&mut inner);
                if let Some(event) = &mut inner.event {
                    event.set_dispatch_target(context, path);
                }
                inner.state = CycleState::Redispatching;
            }
            CycleState::Suspended => {
                self.cancel_timeout_locked(&mut inner);
                if let Some(event) = &mut inner.event {
                    event.set_dispatch_target(context, path);
                }
                inner.state = CycleState::Unsuspending;
                drop(inner);
                self.gate.wake();
            }
            state => {
                tracing::trace!(state = %state, "Dispatch ignored");
            }
        }
    }

    /// Marks terminal intent for a suspension. From `Suspended` this also
    /// schedules a dispatch whose sole purpose is to run
    /// [`RequestCycle::do_complete`]. Redundant calls are silent no-ops.
    pub fn complete(&self) {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Suspending => {
                self.cancel_timeout_locked(&mut inner);
                inner.state = CycleState::Completing;
            }
            CycleState::Suspended => {
                self.cancel_timeout_locked(&mut inner);
                inner.state = CycleState::Completing;
                drop(inner);
                self.gate.wake();
            }
            state => {
                tracing::trace!(state = %state, "Complete ignored");
            }
        }
    }

    /// Invoked by the timeout machinery when the suspension budget elapses.
    ///
    /// No-ops unless the cycle is still `Suspending`/`Suspended`. The
    /// post-expiry transition is claimed under the lock *before* the
    /// timeout listeners run, so a racing resume observes a non-suspended
    /// state and ignores itself; the listeners then fire in registration
    /// order with no lock held.
    pub fn expired(&self) {
        let (prior, event, listeners) = {
            let mut inner = self.lock();
            match inner.state {
                prior @ (CycleState::Suspending | CycleState::Suspended) => {
                    inner.state = match self.on_timeout {
                        TimeoutAction::Complete => CycleState::Completing,
                        TimeoutAction::Dispatch => {
                            if prior == CycleState::Suspended {
                                CycleState::Unsuspending
                            } else {
                                CycleState::Redispatching
                            }
                        }
                    };
                    tracing::debug!(from = %prior, to = %inner.state, "Suspension expired");
                    (prior, inner.event.clone(), inner.listeners.snapshot())
                }
                _ => return,
            }
        };

        if let Some(event) = &event {
            listener::notify_timeout(&listeners, event);
        }

        if prior == CycleState::Suspended {
            self.gate.wake();
        }
    }

    /// Completes the request: legal only from `Uncompleted`. Transitions to
    /// `Complete`, then invokes the completion listeners in registration
    /// order outside the lock, containing any listener fault.
    pub fn do_complete(&self) -> Result<(), CycleError> {
        let (event, listeners) = {
            let mut inner = self.lock();
            if inner.state != CycleState::Uncompleted {
                return Err(CycleError::new("do_complete", inner.state));
            }
            inner.state = CycleState::Complete;
            (inner.event.clone(), inner.listeners.snapshot())
        };

        if let Some(event) = &event {
            listener::notify_complete(&listeners, event);
        }
        Ok(())
    }

    /// Forced abort: jumps to `Complete` from any state, tearing down the
    /// snapshot, listeners and any pending timeout. Used on connection
    /// abort paths.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        self.cancel_timeout_locked(&mut inner);
        inner.state = CycleState::Complete;
        inner.initial = false;
        inner.event = None;
        inner.listeners.clear();
    }

    /// Resets the slot for the next logical request. Illegal while a pass
    /// is actively dispatched.
    pub fn recycle(&self) -> Result<(), CycleError> {
        let mut inner = self.lock();
        match inner.state {
            CycleState::Dispatched | CycleState::Redispatched => {
                Err(CycleError::new("recycle", inner.state))
            }
            _ => {
                self.cancel_timeout_locked(&mut inner);
                inner.state = CycleState::Idle;
                inner.initial = true;
                inner.timeout = self.default_timeout;
                inner.event = None;
                inner.listeners.clear();
                Ok(())
            }
        }
    }

    fn cancel_timeout_locked(&self, inner: &mut Inner) {
        if let Some(event) = &inner.event {
            self.gate.cancel(event.timer_key());
        }
    }

    /// Registers a completion/timeout observer for the current cycle. The
    /// registry is consumed and reset at recycle.
    pub fn add_listener(&self, listener: Arc<dyn CycleListener>) {
        self.lock().listeners.add(listener);
    }

    pub fn state(&self) -> CycleState {
        self.lock().state
    }

    /// True while the current pass is the original, non-resumed dispatch.
    pub fn is_initial(&self) -> bool {
        self.lock().initial
    }

    pub fn is_suspended(&self) -> bool {
        matches!(
            self.lock().state,
            CycleState::Suspending | CycleState::Redispatching | CycleState::Suspended
        )
    }

    /// True while a suspension started in this dispatch is still pending.
    pub fn is_async_started(&self) -> bool {
        matches!(
            self.lock().state,
            CycleState::Suspending
                | CycleState::Redispatching
                | CycleState::Suspended
                | CycleState::Unsuspending
        )
    }

    /// True once the cycle has gone asynchronous at any point since the
    /// last recycle.
    pub fn is_async(&self) -> bool {
        let inner = self.lock();
        !inner.initial
            || matches!(
                inner.state,
                CycleState::Suspending
                    | CycleState::Redispatching
                    | CycleState::Suspended
                    | CycleState::Unsuspending
            )
    }

    /// Timeout budget for the current cycle. Zero means no timeout.
    pub fn timeout(&self) -> Duration {
        self.lock().timeout
    }

    /// Overrides the timeout budget for this cycle. Takes effect at the
    /// next arm point; the default is restored on recycle.
    pub fn set_timeout(&self, timeout: Duration) {
        self.lock().timeout = timeout;
    }

    /// Clone of the active suspension snapshot, if any.
    pub fn event(&self) -> Option<EventSnapshot> {
        self.lock().event.clone()
    }
}
