use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cycle::{CycleListener, EventSnapshot, HandlerContext, RequestCycle};
use crate::message::request::Request;
use crate::message::response::{Response, SharedResponse};

/// Listener that records whether the current request's suspension expired,
/// so the connection can answer 504 instead of the handler's response.
pub struct TimeoutFlag {
    fired: AtomicBool,
}

impl TimeoutFlag {
    pub fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
        }
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::SeqCst);
    }

    pub fn take(&self) -> bool {
        self.fired.swap(false, Ordering::SeqCst)
    }
}

impl Default for TimeoutFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleListener for TimeoutFlag {
    fn on_timeout(&self, event: &EventSnapshot) {
        self.fired.store(true, Ordering::SeqCst);
        tracing::warn!(
            path = event.request().path.as_str(),
            "Request timed out while suspended"
        );
    }
}

/// One handler pass. On the initial pass this routes the command and may
/// suspend the cycle; on a resumed pass the background task has already
/// filled the shared response, so there is nothing left to do but log how
/// we got back here.
pub async fn handle(
    cycle: &Arc<RequestCycle>,
    request: &Arc<Request>,
    shared: &Arc<SharedResponse>,
    timed_out: &Arc<TimeoutFlag>,
) -> anyhow::Result<()> {
    if !cycle.is_initial() {
        let target = cycle
            .event()
            .and_then(|e| e.dispatch_path().map(str::to_string));
        tracing::debug!(target = ?target, path = request.path.as_str(), "Resumed pass");
        return Ok(());
    }

    match request.path.as_str() {
        "/echo" => {
            shared.set(Response::ok(request.body.clone()));
        }

        "/delay" => {
            let Some((ms, text)) = split_delay_args(request) else {
                shared.set(Response::bad_request("usage: DELAY <ms> <text>"));
                return Ok(());
            };
            suspend_current(cycle, request, shared, timed_out)?;

            let cycle = Arc::clone(cycle);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                shared.set(Response::ok(text));
                cycle.dispatch_path("/deliver");
            });
        }

        "/finish" => {
            let Some((ms, text)) = split_delay_args(request) else {
                shared.set(Response::bad_request("usage: FINISH <ms> <text>"));
                return Ok(());
            };
            suspend_current(cycle, request, shared, timed_out)?;

            let cycle = Arc::clone(cycle);
            let shared = Arc::clone(shared);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                shared.set(Response::ok(text));
                cycle.complete();
            });
        }

        "/hold" => {
            let body = request.body_text();
            let arg = body.trim();
            if !arg.is_empty() {
                let Ok(ms) = arg.parse::<u64>() else {
                    shared.set(Response::bad_request("usage: HOLD [ms]"));
                    return Ok(());
                };
                cycle.set_timeout(Duration::from_millis(ms));
            }
            suspend_current(cycle, request, shared, timed_out)?;
        }

        _ => {
            shared.set(Response::bad_request("unknown command"));
        }
    }

    Ok(())
}

fn suspend_current(
    cycle: &Arc<RequestCycle>,
    request: &Arc<Request>,
    shared: &Arc<SharedResponse>,
    timed_out: &Arc<TimeoutFlag>,
) -> anyhow::Result<()> {
    cycle.suspend(
        HandlerContext::new("demo"),
        Arc::clone(request),
        Arc::clone(shared),
    )?;
    cycle.add_listener(Arc::clone(timed_out) as Arc<dyn CycleListener>);
    Ok(())
}

fn split_delay_args(request: &Request) -> Option<(u64, String)> {
    let body = request.body_text();
    let mut parts = body.splitn(2, ' ');
    let ms = parts.next()?.trim().parse::<u64>().ok()?;
    let text = parts.next().unwrap_or("").to_string();
    Some((ms, text))
}
