//! Request-cycle state machine.
//!
//! One [`machine::RequestCycle`] tracks one logical request's passes through
//! the handler pipeline for a connection slot. Handler code may suspend the
//! cycle mid-pipeline; any thread may later resume or complete it; a timeout
//! may expire it. The connection drives `handling()`/`unhandle()` around each
//! pass and `do_complete()`/`recycle()` at the end of the request.
//!
//! # State machine
//!
//! ```text
//!          ┌──────┐ handling()  ┌────────────┐ unhandle()   ┌─────────────┐
//!          │ IDLE ├────────────►│ DISPATCHED ├─────────────►│ UNCOMPLETED │
//!          └──────┘             └─────┬──────┘              └──────┬──────┘
//!             ▲                       │ suspend()                  │ do_complete()
//!             │ recycle()             ▼                            ▼
//!             │                ┌────────────┐               ┌──────────┐
//!             │                │ SUSPENDING │               │ COMPLETE │
//!             │                └─────┬──────┘               └──────────┘
//!             │    dispatch() ┌──────┼──────────┐ complete()/expired()
//!             │               ▼      │unhandle()▼
//!             │      ┌───────────────┤   ┌────────────┐
//!             │      │ REDISPATCHING │   │ COMPLETING │◄─────────┐
//!             │      └───────┬───────┘   └────────────┘          │
//!             │              │unhandle()        ▲                │
//!             │              ▼                  │ complete()/    │
//!             │      ┌──────────────┐           │ expired()      │
//!             │      │ REDISPATCHED │   ┌───────┴───┐ dispatch() ┌──────────────┐
//!             │      └──────────────┘◄──┤ SUSPENDED ├───────────►│ UNSUSPENDING │
//!             │        (via handling()) └───────────┘            └──────────────┘
//!             └──────────────────────────────────────────────────────────────
//! ```
//!
//! Every transition runs under the cycle's own exclusive lock. Listeners are
//! never invoked while the lock is held, and the blocking-transport wait in
//! `unhandle()` releases the lock for the duration of the park (condition
//! variable paired with the same mutex).

pub mod event;
pub mod gate;
pub mod listener;
pub mod machine;
pub mod state;

pub use event::{EventSnapshot, HandlerContext};
pub use listener::{CycleListener, ListenerRegistry};
pub use machine::{CycleError, RequestCycle};
pub use state::CycleState;
