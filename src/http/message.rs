//! HTTP-shaped messages exchanged between nodes.
//!
//! A message is a header collection plus body bytes, discriminated into a
//! request (`method`, `path`) or a response (`status`).

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::http::headers::{self, Headers};
use crate::net::endpoint::{Endpoint, EndpointError};

/// Request methods understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Delete,
    Get,
    Head,
    Post,
    Put,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a method token is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DELETE" => Method::Delete,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "PATCH" => Method::Patch,
            other => return Err(UnknownMethod(other.to_string())),
        })
    }
}

/// Discriminant of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Request { method: Method, path: String },
    Response { status: u16 },
}

/// Headers + body + request/response discriminant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Message {
    pub fn request(method: Method, path: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Request {
                method,
                path: path.into(),
            },
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn response(status: u16) -> Self {
        Self {
            kind: MessageKind::Response { status },
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// A request carrying an application message type, as used for control traffic.
    ///
    /// The destination header holds a placeholder record; receivers only read the source.
    pub fn application(
        src: &Endpoint,
        path: impl Into<String>,
        message_type: u32,
        body: impl Into<Vec<u8>>,
        method: Method,
    ) -> Self {
        let mut message = Self::request(method, path).with_body(body);
        if message_type != 0 {
            message
                .headers
                .insert(headers::APP_MESSAGE_TYPE, message_type.to_string());
        }
        message
            .headers
            .insert(headers::SERVICE_DST, Endpoint::new("", 1, "null").to_record());
        message.headers.insert(headers::SERVICE_SRC, src.to_record());
        message
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_request(&self) -> bool {
        matches!(self.kind, MessageKind::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.kind, MessageKind::Response { .. })
    }

    pub fn method(&self) -> Option<Method> {
        match &self.kind {
            MessageKind::Request { method, .. } => Some(*method),
            MessageKind::Response { .. } => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match &self.kind {
            MessageKind::Request { path, .. } => Some(path),
            MessageKind::Response { .. } => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            MessageKind::Response { status } => Some(*status),
            MessageKind::Request { .. } => None,
        }
    }

    /// Overwrite the status of a response; requests are left untouched.
    pub fn set_status(&mut self, new_status: u16) {
        if let MessageKind::Response { status } = &mut self.kind {
            *status = new_status;
        }
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The sender, decoded from the source header.
    pub fn source(&self) -> Option<Result<Endpoint, EndpointError>> {
        self.headers.get(headers::SERVICE_SRC).map(Endpoint::from_record)
    }

    /// The recipient, decoded from the destination header.
    pub fn destination(&self) -> Option<Result<Endpoint, EndpointError>> {
        self.headers.get(headers::SERVICE_DST).map(Endpoint::from_record)
    }

    /// A response addressed back to whoever sent this message.
    pub fn reply(&self, status: u16) -> Message {
        let mut response = Message::response(status);
        if let Some(src) = self.headers.get(headers::SERVICE_SRC) {
            response.headers.insert(headers::SERVICE_DST, src);
        }
        response
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MessageKind::Request { method, path } => write!(f, "{} {}", method, path)?,
            MessageKind::Response { status } => write!(f, "{}", status)?,
        }
        write!(f, " ({} headers, {} bytes)", self.headers.len(), self.body.len())
    }
}
