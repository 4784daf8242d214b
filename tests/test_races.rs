//! Concurrency properties: resumes, completions and expiries racing on the
//! same cycle resolve to exactly one winner.

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{CountingListener, MockTransport};
use respite::config::CycleConfig;
use respite::cycle::{CycleListener, CycleState, HandlerContext, RequestCycle};
use respite::message::request::{Request, RequestBuilder};
use respite::message::response::SharedResponse;

fn request(path: &str) -> Arc<Request> {
    Arc::new(RequestBuilder::new().path(path).build().unwrap())
}

fn suspended_cycle(
    transport: Arc<MockTransport>,
    listener: Arc<CountingListener>,
) -> Arc<RequestCycle> {
    let cycle = RequestCycle::new(transport, CycleConfig::default());
    cycle.handling().unwrap();
    cycle
        .suspend(
            HandlerContext::new("race"),
            request("/slow"),
            Arc::new(SharedResponse::new()),
        )
        .unwrap();
    cycle.add_listener(listener as Arc<dyn CycleListener>);
    assert!(cycle.unhandle().unwrap());
    assert_eq!(cycle.state(), CycleState::Suspended);
    cycle
}

#[test]
fn concurrent_dispatch_resumes_once() {
    let transport = MockTransport::non_blocking();
    let cycle = suspended_cycle(transport.clone(), CountingListener::new());

    let barrier = Arc::new(Barrier::new(2));
    let mut workers = Vec::new();
    for _ in 0..2 {
        let cycle = Arc::clone(&cycle);
        let barrier = Arc::clone(&barrier);
        workers.push(thread::spawn(move || {
            barrier.wait();
            cycle.dispatch();
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(cycle.state(), CycleState::Unsuspending);
    assert_eq!(transport.dispatch_count(), 1);
}

#[test]
fn timeout_and_resume_resolve_to_exactly_one() {
    // Repeat to give the race a chance to land on both sides.
    for _ in 0..25 {
        let transport = MockTransport::non_blocking();
        let listener = CountingListener::new();
        let cycle = suspended_cycle(transport.clone(), Arc::clone(&listener));
        let key = transport.armed()[0].0;

        let barrier = Arc::new(Barrier::new(2));
        let expiry = {
            let transport = Arc::clone(&transport);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                transport.fire(key);
            })
        };
        let resume = {
            let cycle = Arc::clone(&cycle);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cycle.dispatch();
            })
        };
        expiry.join().unwrap();
        resume.join().unwrap();

        let state = cycle.state();
        let timeouts = listener.timeouts();
        let timed_out = timeouts == 1 && state == CycleState::Completing;
        let resumed = timeouts == 0 && state == CycleState::Unsuspending;
        assert!(
            timed_out ^ resumed,
            "expected exactly one winner, got state {state} with {timeouts} timeout deliveries"
        );
    }
}

#[test]
fn concurrent_resume_and_complete_pick_one() {
    let transport = MockTransport::non_blocking();
    let cycle = suspended_cycle(transport.clone(), CountingListener::new());

    let barrier = Arc::new(Barrier::new(2));
    let resume = {
        let cycle = Arc::clone(&cycle);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            cycle.dispatch();
        })
    };
    let complete = {
        let cycle = Arc::clone(&cycle);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            cycle.complete();
        })
    };
    resume.join().unwrap();
    complete.join().unwrap();

    let state = cycle.state();
    assert!(
        state == CycleState::Unsuspending || state == CycleState::Completing,
        "unexpected state {state}"
    );
    assert_eq!(transport.dispatch_count(), 1);
}

#[test]
fn completion_listeners_fire_at_most_once_per_cycle() {
    let transport = MockTransport::non_blocking();
    let listener = CountingListener::new();
    let cycle = suspended_cycle(transport, Arc::clone(&listener));

    cycle.complete();
    assert!(cycle.unhandle().unwrap());
    cycle.do_complete().unwrap();
    assert_eq!(listener.completes(), 1);

    // A second completion attempt is a contract violation, not a repeat
    // notification.
    assert!(cycle.do_complete().is_err());
    assert_eq!(listener.completes(), 1);

    cycle.recycle().unwrap();
    assert_eq!(listener.timeouts(), 0);
}
