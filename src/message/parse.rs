use std::collections::HashMap;

use crate::message::request::Request;

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest,
    LineTooLong,
    Incomplete,
}

/// Maximum accepted command-line length.
const MAX_LINE: usize = 64 * 1024;

/// Parses one command line ("COMMAND arguments...") from the front of the
/// buffer into a request routed at "/command".
///
/// Returns the request plus the number of bytes consumed, or `Incomplete`
/// when no full line has arrived yet.
pub fn parse_line(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let line_end = match buf.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if buf.len() > MAX_LINE => return Err(ParseError::LineTooLong),
        None => return Err(ParseError::Incomplete),
    };

    let mut line = &buf[..line_end];
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }

    let line = std::str::from_utf8(line).map_err(|_| ParseError::InvalidRequest)?;
    let mut parts = line.splitn(2, ' ');

    let command = parts.next().filter(|c| !c.is_empty()).ok_or(ParseError::InvalidRequest)?;
    let rest = parts.next().unwrap_or("");

    let request = Request {
        path: format!("/{}", command.to_ascii_lowercase()),
        headers: HashMap::new(),
        body: rest.as_bytes().to_vec(),
    };

    Ok((request, line_end + 1))
}
