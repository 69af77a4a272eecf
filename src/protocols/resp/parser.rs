//! RESP frame parsing and encoding.
//!
//! Requests from real clients arrive as arrays of bulk strings; replies are
//! built as [`Reply`] values and encoded so that bulk lengths always match
//! their payloads.

use bytes::{Bytes, BytesMut};

/// RESP2 frame types
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string: +OK\r\n
    Simple(String),
    /// Error: -ERR message\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $5\r\nhello\r\n or $-1\r\n (null)
    Bulk(Option<Bytes>),
    /// Array: *2\r\n... or *-1\r\n (null)
    Array(Option<Vec<Frame>>),
}

/// Frames the decoy sends back.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(&'static str),
    Error(&'static str),
    Bulk(Option<Bytes>),
}

impl Reply {
    /// Create a null bulk string response
    pub fn null() -> Reply {
        Reply::Bulk(None)
    }

    /// Create a bulk string response
    pub fn bulk<B: Into<Bytes>>(data: B) -> Reply {
        Reply::Bulk(Some(data.into()))
    }

    /// Encode a reply to bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Encode a reply into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Simple(s) => line(buf, b'+', s.as_bytes()),
            Reply::Error(s) => line(buf, b'-', s.as_bytes()),
            Reply::Bulk(None) => buf.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => {
                line(buf, b'$', data.len().to_string().as_bytes());
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\r\n");
            }
        }
    }
}

fn line(buf: &mut BytesMut, prefix: u8, body: &[u8]) {
    buf.extend_from_slice(&[prefix]);
    buf.extend_from_slice(body);
    buf.extend_from_slice(b"\r\n");
}

/// Deepest array nesting accepted. Commands are flat arrays.
const MAX_NESTING: usize = 8;

/// Parse result
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed a frame with bytes consumed
    Complete(Frame, usize),
    /// Need more data
    Incomplete,
    /// Parse error
    Error(String),
}

/// Parse a RESP frame from the start of a buffer
pub fn parse(buffer: &[u8]) -> ParseResult {
    parse_nested(buffer, 0)
}

fn parse_nested(buffer: &[u8], depth: usize) -> ParseResult {
    if buffer.is_empty() {
        return ParseResult::Incomplete;
    }

    match buffer[0] {
        b'+' => parse_text(buffer, Frame::Simple),
        b'-' => parse_text(buffer, Frame::Error),
        b':' => parse_integer(buffer),
        b'$' => parse_bulk_string(buffer),
        b'*' => parse_array(buffer, depth),
        other => ParseResult::Error(format!("Unknown frame type: {}", other as char)),
    }
}

/// Find CRLF in buffer, return position of \r
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    (0..buffer.len().saturating_sub(1)).find(|&i| buffer[i] == b'\r' && buffer[i + 1] == b'\n')
}

/// The text between the type byte and the first CRLF, plus bytes consumed.
fn header_line(buffer: &[u8]) -> Option<Result<(&str, usize), String>> {
    let end = find_crlf(buffer)?;
    Some(
        std::str::from_utf8(&buffer[1..end])
            .map(|s| (s, end + 2))
            .map_err(|_| "Invalid UTF-8 in frame header".to_string()),
    )
}

/// Parse `+text\r\n` or `-text\r\n`
fn parse_text(buffer: &[u8], make: fn(String) -> Frame) -> ParseResult {
    match header_line(buffer) {
        Some(Ok((s, consumed))) => ParseResult::Complete(make(s.to_string()), consumed),
        Some(Err(e)) => ParseResult::Error(e),
        None => ParseResult::Incomplete,
    }
}

/// Parse an integer: :1000\r\n
fn parse_integer(buffer: &[u8]) -> ParseResult {
    match header_line(buffer) {
        Some(Ok((s, consumed))) => match s.parse::<i64>() {
            Ok(n) => ParseResult::Complete(Frame::Integer(n), consumed),
            Err(_) => ParseResult::Error(format!("Invalid integer: {s}")),
        },
        Some(Err(e)) => ParseResult::Error(e),
        None => ParseResult::Incomplete,
    }
}

/// Parse the signed length of a bulk string or array header.
fn parse_length(buffer: &[u8], what: &str) -> Result<Option<(i64, usize)>, String> {
    match header_line(buffer) {
        Some(Ok((s, consumed))) => s
            .parse::<i64>()
            .map(|len| Some((len, consumed)))
            .map_err(|_| format!("Invalid {what} length: {s}")),
        Some(Err(e)) => Err(e),
        None => Ok(None),
    }
}

/// Parse a bulk string: $5\r\nhello\r\n or $-1\r\n
fn parse_bulk_string(buffer: &[u8]) -> ParseResult {
    let (len, data_start) = match parse_length(buffer, "bulk string") {
        Ok(Some(header)) => header,
        Ok(None) => return ParseResult::Incomplete,
        Err(e) => return ParseResult::Error(e),
    };

    // Null bulk string
    if len < 0 {
        return ParseResult::Complete(Frame::Bulk(None), data_start);
    }

    let data_end = data_start + len as usize;
    let total_len = data_end + 2; // +2 for trailing \r\n

    if buffer.len() < total_len {
        return ParseResult::Incomplete;
    }

    if &buffer[data_end..total_len] != b"\r\n" {
        return ParseResult::Error("Bulk string missing trailing CRLF".to_string());
    }

    let data = Bytes::copy_from_slice(&buffer[data_start..data_end]);
    ParseResult::Complete(Frame::Bulk(Some(data)), total_len)
}

/// Parse an array: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n
fn parse_array(buffer: &[u8], depth: usize) -> ParseResult {
    if depth >= MAX_NESTING {
        return ParseResult::Error("Array nesting too deep".to_string());
    }

    let (len, mut offset) = match parse_length(buffer, "array") {
        Ok(Some(header)) => header,
        Ok(None) => return ParseResult::Incomplete,
        Err(e) => return ParseResult::Error(e),
    };

    // Null array
    if len < 0 {
        return ParseResult::Complete(Frame::Array(None), offset);
    }

    // Every element takes at least 3 bytes; reject absurd counts before allocating
    let len = len as usize;
    let mut frames = Vec::with_capacity(len.min(buffer.len() / 3));

    for _ in 0..len {
        match parse_nested(&buffer[offset..], depth + 1) {
            ParseResult::Complete(frame, consumed) => {
                frames.push(frame);
                offset += consumed;
            }
            other => return other,
        }
    }

    ParseResult::Complete(Frame::Array(Some(frames)), offset)
}
