//! Shared runtime state handed to every handler.
//!
//! # Responsibilities
//! - Own the node table, the event queue and the router
//! - Commit outgoing messages: address, validate, resolve the destination, send
//! - Carry service state in a typed extension map
//!
//! # Design Decisions
//! - Passed as `&mut Context`; the loop is single-threaded, so no locking
//! - Unknown destinations are connected on demand when committing
//! - Replies to ephemeral nodes schedule their removal right after sending

use std::any::{Any, TypeId};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::Configuration;
use crate::http::{self, headers, Message, SerializeError, ValidationError};
use crate::net::{Endpoint, EndpointError, Neighbor, TransportError};
use crate::routing::{RouteParams, Router};
use crate::runtime::event::{Event, EventQueue, EventType};
use crate::runtime::handler::{HandlerError, RouteHandler};
use crate::runtime::nodes::{NodeError, NodeTable};

/// Why an outgoing message could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("invalid outgoing message: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid destination: {0}")]
    Destination(#[from] EndpointError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Type-keyed storage for service state.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the previous one of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast::<T>().ok().map(|b| *b))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast::<T>().ok().map(|b| *b))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions").field("len", &self.map.len()).finish()
    }
}

/// Runtime state shared by the loop and every handler.
pub struct Context {
    node_self: Endpoint,
    config: Configuration,
    uuid: Uuid,
    pub(crate) running: bool,
    verbose: bool,
    nodes: NodeTable,
    pub(crate) events: EventQueue,
    pub(crate) router: Router<RouteHandler>,
    extensions: Extensions,
}

impl Context {
    pub fn new(node_self: Endpoint, config: Configuration) -> Self {
        let verbose = config.verbose();
        let nodes = NodeTable::new(node_self.ip());
        Self {
            node_self,
            config,
            uuid: Uuid::new_v4(),
            running: false,
            verbose,
            nodes,
            events: EventQueue::new(),
            router: Router::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn node_self(&self) -> &Endpoint {
        &self.node_self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Identifier of this node instance, fresh on every start.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn router(&self) -> &Router<RouteHandler> {
        &self.router
    }

    /// Register a route handler; see [`Router::add_route`].
    pub fn add_route<F>(&mut self, pattern: &str, handler: F)
    where
        F: for<'a> Fn(
                &'a mut Context,
                RouteParams,
                Message,
            ) -> futures_util::future::BoxFuture<'a, Result<Message, HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        let handler: RouteHandler = std::sync::Arc::new(handler);
        self.router.add_route(pattern, handler);
    }

    /// Queue an event for the loop. The event is addressed to this node and
    /// dropped if its message does not validate.
    pub fn dispatch_event(&mut self, mut event: Event) {
        event.address(&self.node_self.to_record());
        if let Err(e) = http::validate_event(event.message()) {
            tracing::warn!(event = %event.event_type(), error = %e, "Dropping invalid event");
            return;
        }
        tracing::trace!(event = %event.event_type(), pending = self.events.len(), "Event dispatched");
        self.events.push(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Ask the loop to stop once the queued events ahead of this one are handled.
    pub fn request_termination(&mut self) {
        self.dispatch_event(Event::new(EventType::SERVICE_TERMINATE));
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub async fn add_node(&mut self, endpoint: Endpoint) -> Result<&Neighbor, NodeError> {
        if self.verbose {
            tracing::info!(
                tag = %self.node_self.tag(),
                node = %endpoint.tag(),
                address = %endpoint.address(),
                "Adding node"
            );
        }
        match self.nodes.add(endpoint).await {
            Ok(neighbor) => Ok(neighbor),
            Err(e) => {
                tracing::warn!(tag = %self.node_self.tag(), error = %e, "Failed to add node");
                Err(e)
            }
        }
    }

    pub fn delete_node(&mut self, endpoint: &Endpoint) -> Result<(), NodeError> {
        self.nodes.delete(endpoint)?;
        if self.verbose {
            tracing::info!(tag = %self.node_self.tag(), node = %endpoint.tag(), "Node removed");
        }
        Ok(())
    }

    pub fn find_node(&self, tag: &str) -> Option<&Neighbor> {
        self.nodes.find(tag)
    }

    /// Drop every neighbor, closing their channels.
    pub(crate) fn release_nodes(&mut self) {
        self.nodes.clear();
    }

    /// Send `message` to the node named in its destination header.
    ///
    /// The source header is filled with this node when absent. Unknown
    /// destinations are added first, and a temporary destination that moved
    /// is reconnected. Returns the destination tag.
    pub async fn commit(&mut self, mut message: Message) -> Result<String, TransactionError> {
        if !message.headers.contains(headers::SERVICE_SRC) {
            message
                .headers
                .insert(headers::SERVICE_SRC, self.node_self.to_record());
        }
        http::validate(&message)?;
        let destination = match message.destination() {
            Some(parsed) => parsed?,
            None => return Err(ValidationError::MissingHeader(headers::SERVICE_DST).into()),
        };
        let payload = http::serialize(&message)?;

        // A temporary node may come back on a new port under the same tag.
        let moved = destination.is_ephemeral()
            && self
                .nodes
                .find(destination.tag())
                .is_some_and(|known| known.endpoint() != &destination);
        if moved {
            self.nodes.delete(&destination)?;
        }

        if !self.nodes.contains(destination.tag()) {
            if self.verbose {
                tracing::warn!(node = %destination.tag(), "Destination unknown, adding it");
            }
            self.add_node(destination.clone()).await?;
        }
        let neighbor = self
            .nodes
            .find(destination.tag())
            .ok_or_else(|| NodeError::Unknown(destination.tag().to_string()))?;

        if self.verbose {
            tracing::info!(
                tag = %self.node_self.tag(),
                node = %neighbor.tag(),
                bytes = payload.len(),
                message = %message,
                "Sending"
            );
        }
        neighbor.send(&payload).await?;

        if neighbor.is_ephemeral() {
            let record = neighbor.to_record();
            self.dispatch_event(
                Event::new(EventType::DELETE_NODE).with_params(serde_json::json!([record])),
            );
        }
        Ok(destination.tag().to_string())
    }

    /// Send an error response with `status` to an already-known node.
    pub async fn send_error(&mut self, tag: &str, status: u16) -> Result<String, TransactionError> {
        let neighbor = self
            .nodes
            .find(tag)
            .ok_or_else(|| NodeError::Unknown(tag.to_string()))?;
        let response = neighbor.response(status);
        self.commit(response).await
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("node_self", &self.node_self)
            .field("uuid", &self.uuid)
            .field("running", &self.running)
            .field("nodes", &self.nodes.len())
            .field("events", &self.events.len())
            .field("routes", &self.router.len())
            .finish()
    }
}
