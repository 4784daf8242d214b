//! Request/response payloads referenced by a cycle, plus the line-command
//! reader used by the demo container.
//!
//! - **`request`**: the request object a suspension snapshots
//! - **`response`**: response values and the shared slot resume threads
//!   fill in
//! - **`parse`**: incremental line parsing from a byte buffer

pub mod parse;
pub mod request;
pub mod response;

pub use parse::{ParseError, parse_line};
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder, SharedResponse, StatusCode};
