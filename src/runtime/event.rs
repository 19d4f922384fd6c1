//! Local events and the event queue.
//!
//! An event is request-shaped (`POST /local/event`) so it can be logged and
//! inspected like traffic, plus a JSON parameter value for its handler.

use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;

use crate::http::{headers, Message, Method};

/// Path carried by every event.
pub const EVENT_PATH: &str = "/local/event";

/// Numeric event type. Ids below the built-ins are free for services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventType(pub u32);

impl EventType {
    /// Stops the run loop.
    pub const SERVICE_TERMINATE: EventType = EventType(10001);
    /// Removes the nodes listed in the parameters (array of node records).
    pub const DELETE_NODE: EventType = EventType(10002);

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        event_name(self.0)
    }
}

impl From<u32> for EventType {
    fn from(id: u32) -> Self {
        EventType(id)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

/// Name of a built-in event type.
pub fn event_name(id: u32) -> &'static str {
    match EventType(id) {
        EventType::SERVICE_TERMINATE => "SERVICE_TERMINATE",
        EventType::DELETE_NODE => "DELETE_NODE",
        _ => "UNKNOWN EVENT",
    }
}

/// A queued event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: EventType,
    message: Message,
    params: Value,
}

impl Event {
    /// An event named after its built-in type.
    pub fn new(event_type: EventType) -> Self {
        Self::named(event_type, event_type.name())
    }

    pub fn named(event_type: EventType, name: impl Into<String>) -> Self {
        let message = Message::request(Method::Post, EVENT_PATH)
            .with_header(headers::EVENT_TYPE, event_type.id().to_string())
            .with_header(headers::EVENT_NAME, name);
        Self {
            event_type,
            message,
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn name(&self) -> &str {
        self.message
            .headers
            .get(headers::EVENT_NAME)
            .unwrap_or_default()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn into_params(self) -> Value {
        self.params
    }

    /// Address the event message from and to the same node record.
    pub(crate) fn address(&mut self, record: &str) {
        self.message.headers.insert(headers::SERVICE_SRC, record);
        self.message.headers.insert(headers::SERVICE_DST, record);
    }
}

/// FIFO of pending events, drained one per loop iteration.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push_back(event);
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
