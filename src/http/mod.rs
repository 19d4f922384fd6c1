//! HTTP-shaped protocol codec subsystem.
//!
//! # Data Flow
//! ```text
//! Datagram payload
//!     → codec.rs (start line, headers, body; gunzip when marked)
//!     → message.rs (Request { method, path } | Response { status })
//!     → Handed to the runtime for dispatch
//!
//! Handler output
//!     → validate.rs (path / status range / src + dst headers)
//!     → codec.rs (serialize, content-length recomputed)
//!     → Sent through a neighbor channel
//! ```
//!
//! # Design Decisions
//! - One message per datagram; no chunking, no keep-alive
//! - Headers are case-insensitive, stored lowercase
//! - Addressing travels in `application-src` / `application-dst` headers as node records

pub mod codec;
pub mod headers;
pub mod message;
pub mod status;
pub mod validate;

pub use codec::{parse, serialize, ParseError, Parser, SerializeError};
pub use headers::Headers;
pub use message::{Message, MessageKind, Method, UnknownMethod};
pub use validate::{validate, validate_event, ValidationError};
