//! Handler signatures and the numeric handler registries.
//!
//! Handlers are async closures over `&mut Context`. Registration functions take
//! the closure type directly so callers can write
//! `|ctx, params, request| Box::pin(async move { ... })`.

use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::client::ClientError;
use crate::http::{Message, SerializeError};
use crate::net::TransportError;
use crate::routing::RouteParams;
use crate::runtime::context::{Context, TransactionError};
use crate::runtime::nodes::NodeError;

/// Answers a routed request. The returned message is committed by the loop.
pub type RouteHandler = Arc<
    dyn for<'a> Fn(&'a mut Context, RouteParams, Message) -> BoxFuture<'a, Result<Message, HandlerError>>
        + Send
        + Sync,
>;

/// Handles a message carrying `application-messagetype`. `None` means no reply.
pub type MessageHandler = Arc<
    dyn for<'a> Fn(&'a mut Context, Message) -> BoxFuture<'a, Result<Option<Message>, HandlerError>>
        + Send
        + Sync,
>;

/// Reacts to a queued event's parameters.
pub type EventHandler = Arc<
    dyn for<'a> Fn(&'a mut Context, serde_json::Value) -> BoxFuture<'a, Result<(), HandlerError>>
        + Send
        + Sync,
>;

/// Failure reported by a handler; the loop answers the sender with a 500.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }
}

/// Errors from handler registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("a handler is already registered for type {0}")]
    Duplicate(u32),

    #[error("no handler registered for type {0}")]
    Unknown(u32),
}

/// Handlers keyed by numeric type.
#[derive(Clone)]
pub struct HandlerRegistry<H> {
    handlers: BTreeMap<u32, H>,
}

impl<H> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }
}

impl<H> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: u32, handler: H) -> Result<(), RegistrationError> {
        if self.handlers.contains_key(&id) {
            return Err(RegistrationError::Duplicate(id));
        }
        self.handlers.insert(id, handler);
        Ok(())
    }

    /// Register under the lowest free id, starting from 1.
    pub fn register_auto(&mut self, handler: H) -> u32 {
        let id = (1..)
            .find(|id| !self.handlers.contains_key(id))
            .unwrap_or(u32::MAX);
        self.handlers.insert(id, handler);
        id
    }

    pub fn deregister(&mut self, id: u32) -> Result<H, RegistrationError> {
        self.handlers
            .remove(&id)
            .ok_or(RegistrationError::Unknown(id))
    }

    pub fn get(&self, id: u32) -> Option<&H> {
        self.handlers.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.handlers.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.handlers.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<H> std::fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("ids", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
