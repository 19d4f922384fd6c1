//! Wire codec for HTTP-shaped datagrams.
//!
//! # Responsibilities
//! - Incrementally parse bytes into a [`Message`] (start line, headers, body)
//! - Serialize a [`Message`] back into bytes
//! - Transparently gunzip response bodies marked `content-encoding: gzip`
//!
//! # Design Decisions
//! - Hand-written line parser; no HTTP library, the dialect is not standard HTTP
//! - `content-length` is written as `body + 2`, and the parser appends one virtual
//!   terminator byte before capping at `content-length` and dropping the last byte.
//!   Existing peers rely on this exact framing, so `parse(serialize(m))` keeps the body intact
//! - Header keys are lowercased; only the single space after `:` is dropped from
//!   values, so padded values survive a round trip

use std::io::Read;

use flate2::read::GzDecoder;

use crate::http::headers::{self, Headers};
use crate::http::message::{Message, MessageKind, Method};
use crate::http::status;

/// Errors produced while parsing a datagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty message")]
    Empty,

    #[error("malformed start line '{0}'")]
    StartLine(String),

    #[error("malformed header line '{0}'")]
    Header(String),

    #[error("invalid content-length '{0}'")]
    ContentLength(String),

    #[error("message ended before the header block was terminated")]
    Unterminated,
}

/// Errors produced while serializing a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    #[error("status {0} has no reason phrase")]
    UnknownStatus(u16),

    #[error("request path '{0}' cannot be written on a start line")]
    InvalidPath(String),

    #[error("header '{0}' contains a line break")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StartLine,
    Headers,
    Body,
}

/// Incremental parser. Feed bytes as they arrive, then call [`Parser::finish`].
#[derive(Debug)]
pub struct Parser {
    state: ParseState,
    pending: Vec<u8>,
    kind: Option<MessageKind>,
    headers: Headers,
    body: Vec<u8>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParseState::StartLine,
            pending: Vec::new(),
            kind: None,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Consume a chunk of input.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), ParseError> {
        if self.state == ParseState::Body {
            self.body.extend_from_slice(bytes);
            return Ok(());
        }

        self.pending.extend_from_slice(bytes);
        while self.state != ParseState::Body {
            let Some(newline) = self.pending.iter().position(|b| *b == b'\n') else {
                break;
            };
            let mut line: Vec<u8> = self.pending.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.line(&String::from_utf8_lossy(&line))?;
        }

        if self.state == ParseState::Body {
            self.body.append(&mut self.pending);
        }
        Ok(())
    }

    /// Complete the parse once all input has been fed.
    pub fn finish(self) -> Result<Message, ParseError> {
        let kind = match (self.state, self.kind) {
            (ParseState::Body, Some(kind)) => kind,
            (ParseState::StartLine, None) if self.pending.iter().all(u8::is_ascii_whitespace) => {
                return Err(ParseError::Empty)
            }
            _ => return Err(ParseError::Unterminated),
        };

        let mut body = self.body;
        body.push(0);
        if let Some(raw) = self.headers.get(headers::CONTENT_LENGTH) {
            let declared: usize = raw
                .trim()
                .parse()
                .map_err(|_| ParseError::ContentLength(raw.to_string()))?;
            body.truncate(declared);
        }
        body.pop();

        let gzipped = self
            .headers
            .get(headers::CONTENT_ENCODING)
            .is_some_and(|encoding| encoding.contains("gzip"));
        if gzipped && matches!(kind, MessageKind::Response { .. }) {
            body = gunzip(body);
        }

        Ok(Message {
            kind,
            headers: self.headers,
            body,
        })
    }

    fn line(&mut self, line: &str) -> Result<(), ParseError> {
        match self.state {
            ParseState::StartLine => {
                // Tolerate blank lines ahead of the start line.
                if line.trim().is_empty() {
                    return Ok(());
                }
                self.kind = Some(start_line(line)?);
                self.state = ParseState::Headers;
            }
            ParseState::Headers => {
                if line.is_empty() {
                    self.state = ParseState::Body;
                    return Ok(());
                }
                let (name, value) = line
                    .split_once(':')
                    .ok_or_else(|| ParseError::Header(line.to_string()))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ParseError::Header(line.to_string()));
                }
                self.headers.insert(name, value.strip_prefix(' ').unwrap_or(value));
            }
            ParseState::Body => {}
        }
        Ok(())
    }
}

fn start_line(line: &str) -> Result<MessageKind, ParseError> {
    let malformed = || ParseError::StartLine(line.to_string());
    let mut parts = line.split_whitespace();
    let first = parts.next().ok_or_else(malformed)?;

    if first.starts_with("HTTP/") {
        let status = parts
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        return Ok(MessageKind::Response { status });
    }

    let method: Method = first.parse().map_err(|_| malformed())?;
    let path = parts.next().ok_or_else(malformed)?;
    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => Ok(MessageKind::Request {
            method,
            path: path.to_string(),
        }),
        _ => Err(malformed()),
    }
}

fn gunzip(body: Vec<u8>) -> Vec<u8> {
    let mut decoded = Vec::new();
    match GzDecoder::new(body.as_slice()).read_to_end(&mut decoded) {
        Ok(_) => decoded,
        Err(e) => {
            tracing::warn!(error = %e, bytes = body.len(), "Failed to decompress gzip body");
            body
        }
    }
}

/// Parse one complete datagram.
pub fn parse(bytes: &[u8]) -> Result<Message, ParseError> {
    let mut parser = Parser::new();
    parser.feed(bytes)?;
    parser.finish()
}

/// Serialize a message for the wire.
pub fn serialize(message: &Message) -> Result<Vec<u8>, SerializeError> {
    let mut out = String::new();
    match &message.kind {
        MessageKind::Request { method, path } => {
            if path.is_empty() || path.contains(char::is_whitespace) {
                return Err(SerializeError::InvalidPath(path.clone()));
            }
            out.push_str(&format!("{} {} HTTP/1.1\n", method, path));
        }
        MessageKind::Response { status } => {
            let reason = status::reason(*status).ok_or(SerializeError::UnknownStatus(*status))?;
            out.push_str(&format!("HTTP/1.1 {} {}\n", status, reason));
        }
    }

    for (name, value) in message.headers.iter() {
        if name == headers::CONTENT_LENGTH {
            continue;
        }
        if value.contains(&['\r', '\n'][..]) || name.contains(&['\r', '\n', ':'][..]) {
            return Err(SerializeError::InvalidHeader(name.to_string()));
        }
        out.push_str(&format!("{}: {}\n", name, value));
    }
    out.push_str(&format!("{}: {}\n", headers::CONTENT_LENGTH, message.body.len() + 2));
    out.push_str("\r\n");

    let mut bytes = out.into_bytes();
    bytes.extend_from_slice(&message.body);
    Ok(bytes)
}
