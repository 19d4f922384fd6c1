//! Structural checks applied before a message leaves the node.

use crate::http::headers;
use crate::http::message::{Message, MessageKind};
use crate::http::status;

/// Reasons a message may not be sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("request has an empty path")]
    MissingPath,

    #[error("status {0} is outside 100..=511")]
    InvalidStatus(u16),

    #[error("missing header '{0}'")]
    MissingHeader(&'static str),

    #[error("event type '{0}' is not numeric")]
    InvalidEventType(String),
}

/// Check that a message is well formed and addressed.
pub fn validate(message: &Message) -> Result<(), ValidationError> {
    match &message.kind {
        MessageKind::Request { path, .. } if path.is_empty() => {
            return Err(ValidationError::MissingPath)
        }
        MessageKind::Response { status } if !status::is_valid(*status) => {
            return Err(ValidationError::InvalidStatus(*status))
        }
        _ => {}
    }

    for key in [headers::SERVICE_SRC, headers::SERVICE_DST] {
        if !message.headers.contains(key) {
            return Err(ValidationError::MissingHeader(key));
        }
    }
    Ok(())
}

/// Event messages additionally carry a numeric event type.
pub fn validate_event(message: &Message) -> Result<u32, ValidationError> {
    validate(message)?;
    let raw = message
        .headers
        .get(headers::EVENT_TYPE)
        .ok_or(ValidationError::MissingHeader(headers::EVENT_TYPE))?;
    raw.parse()
        .map_err(|_| ValidationError::InvalidEventType(raw.to_string()))
}
