//! Demo container embedding the request cycle end to end.
//!
//! A small line-protocol TCP server: each connection owns one
//! [`crate::cycle::RequestCycle`], recycled across commands. Handlers may
//! suspend a command; background tasks resume or complete it; the timeout
//! expires it. This is scaffolding around the core, not an HTTP server.
//!
//! Commands:
//!
//! - `ECHO <text>` — answered immediately
//! - `DELAY <ms> <text>` — suspends; a task resumes via `dispatch_path`
//! - `FINISH <ms> <text>` — suspends; a task fills the response and
//!   calls `complete()`
//! - `HOLD [ms]` — suspends with no resume; the timeout fires

pub mod connection;
pub mod handler;
pub mod listener;

pub use connection::Connection;
pub use listener::Listener;
