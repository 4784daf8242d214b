use std::sync::Arc;

use crate::message::request::Request;
use crate::message::response::SharedResponse;
use crate::timer::TimerKey;

/// Identifies the handler/container context a suspension belongs to, so the
/// container can route the resumed pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerContext {
    name: String,
}

impl HandlerContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Record of one suspend cycle: the request/response pair active when the
/// suspension began, the context it began under, and the optional dispatch
/// target installed by a later `dispatch_to`/`dispatch_path` call.
///
/// Created by `suspend()`, destroyed by `recycle()`/`cancel()`. Listeners
/// receive a clone, so the snapshot they see is stable even while the cycle
/// moves on.
#[derive(Debug, Clone)]
pub struct EventSnapshot {
    request: Arc<Request>,
    response: Arc<SharedResponse>,
    suspended_context: HandlerContext,
    dispatch_context: Option<HandlerContext>,
    dispatch_path: Option<String>,
    timer_key: TimerKey,
}

impl EventSnapshot {
    pub(crate) fn new(
        suspended_context: HandlerContext,
        request: Arc<Request>,
        response: Arc<SharedResponse>,
    ) -> Self {
        Self {
            request,
            response,
            suspended_context,
            dispatch_context: None,
            dispatch_path: None,
            timer_key: TimerKey::next(),
        }
    }

    /// A repeated `suspend()` while already suspending refreshes the
    /// snapshot in place rather than installing a second one.
    pub(crate) fn reinstall(
        &mut self,
        suspended_context: HandlerContext,
        request: Arc<Request>,
        response: Arc<SharedResponse>,
    ) {
        self.suspended_context = suspended_context;
        self.request = request;
        self.response = response;
    }

    pub(crate) fn set_dispatch_target(
        &mut self,
        context: Option<HandlerContext>,
        path: Option<String>,
    ) {
        if context.is_some() {
            self.dispatch_context = context;
        }
        if path.is_some() {
            self.dispatch_path = path;
        }
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn response(&self) -> &Arc<SharedResponse> {
        &self.response
    }

    pub fn suspended_context(&self) -> &HandlerContext {
        &self.suspended_context
    }

    pub fn dispatch_context(&self) -> Option<&HandlerContext> {
        self.dispatch_context.as_ref()
    }

    pub fn dispatch_path(&self) -> Option<&str> {
        self.dispatch_path.as_deref()
    }

    /// Key of the timeout task armed for this suspension. Only the
    /// non-blocking gate path ever schedules it.
    pub fn timer_key(&self) -> TimerKey {
        self.timer_key
    }
}
