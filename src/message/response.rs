use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Status codes used by responses.
///
/// - `Ok` (200): request successful
/// - `BadRequest` (400): malformed command
/// - `InternalServerError` (500): handler produced nothing
/// - `GatewayTimeout` (504): suspension expired before a resume arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 500 Internal Server Error
    InternalServerError,
    /// 504 Gateway Timeout
    GatewayTimeout,
}

impl StatusCode {
    /// Returns the numeric status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use respite::message::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::GatewayTimeout.as_u16(), 504);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::InternalServerError => 500,
            StatusCode::GatewayTimeout => 504,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }
}

/// A complete response ready to be written back to the client.
#[derive(Debug, Clone)]
pub struct Response {
    /// The status code
    pub status: StatusCode,
    /// Response metadata as key-value pairs
    pub headers: HashMap<String, String>,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing responses in a fluent style.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

impl Response {
    /// Creates a 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body.into()).build()
    }

    /// Creates a 400 response.
    pub fn bad_request(message: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::BadRequest)
            .body(message.into())
            .build()
    }

    /// Creates a 500 response.
    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::InternalServerError)
            .body(b"internal error".to_vec())
            .build()
    }

    /// Creates a 504 response for an expired suspension.
    pub fn gateway_timeout() -> Self {
        ResponseBuilder::new(StatusCode::GatewayTimeout)
            .body(b"timeout".to_vec())
            .build()
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The response object active for one cycle: a slot shared between handler
/// passes and whatever background thread finishes the work.
///
/// The suspension snapshot references this slot, so a resume thread can
/// fill it in before calling `dispatch()`/`complete()` and the connection
/// reads it back once the cycle completes.
#[derive(Debug, Default)]
pub struct SharedResponse {
    slot: Mutex<Option<Response>>,
}

impl SharedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Response>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, response: Response) {
        *self.lock() = Some(response);
    }

    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Takes the response out, leaving the slot empty for the next request.
    pub fn take(&self) -> Option<Response> {
        self.lock().take()
    }
}
