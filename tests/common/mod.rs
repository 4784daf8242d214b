//! Shared test support: a recording transport with manually fireable
//! timeouts, so race and expiry tests stay deterministic.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use respite::cycle::{CycleListener, EventSnapshot};
use respite::timer::TimerKey;
use respite::transport::{ExpireFn, Transport};

pub struct MockTransport {
    blocking: bool,
    dispatches: AtomicUsize,
    armed: Mutex<Vec<(TimerKey, Duration)>>,
    cancelled: Mutex<Vec<TimerKey>>,
    pending: Mutex<HashMap<TimerKey, ExpireFn>>,
}

impl MockTransport {
    pub fn non_blocking() -> Arc<Self> {
        Arc::new(Self::new(false))
    }

    pub fn blocking() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    fn new(blocking: bool) -> Self {
        Self {
            blocking,
            dispatches: AtomicUsize::new(0),
            armed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn armed(&self) -> Vec<(TimerKey, Duration)> {
        self.armed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<TimerKey> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Runs the pending timeout for `key` on the calling thread, as the
    /// container's scheduler would. Returns false if it was cancelled or
    /// never armed.
    pub fn fire(&self, key: TimerKey) -> bool {
        let expire = self.pending.lock().unwrap().remove(&key);
        match expire {
            Some(expire) => {
                expire();
                true
            }
            None => false,
        }
    }
}

/// Listener counting how many times each side was delivered.
pub struct CountingListener {
    timeouts: AtomicUsize,
    completes: AtomicUsize,
}

impl CountingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            timeouts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
        })
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::SeqCst)
    }

    pub fn completes(&self) -> usize {
        self.completes.load(Ordering::SeqCst)
    }
}

impl CycleListener for CountingListener {
    fn on_timeout(&self, _event: &EventSnapshot) {
        self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, _event: &EventSnapshot) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn is_blocking(&self) -> bool {
        self.blocking
    }

    fn schedule_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
    }

    fn schedule_timeout(&self, key: TimerKey, after: Duration, expire: ExpireFn) {
        self.armed.lock().unwrap().push((key, after));
        self.pending.lock().unwrap().insert(key, expire);
    }

    fn cancel_timeout(&self, key: TimerKey) {
        self.cancelled.lock().unwrap().push(key);
        self.pending.lock().unwrap().remove(&key);
    }
}
