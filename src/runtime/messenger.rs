//! The node run loop.
//!
//! # Responsibilities
//! - Bind the receive channel and install the built-in handlers
//! - Alternate between one queued event and one timeout-bounded receive
//! - Dispatch datagrams to message handlers or routes and commit the replies
//! - Publish lifecycle state on a watch channel
//!
//! # Design Decisions
//! - Single task, one datagram at a time; handlers run to completion before the next receive
//! - Network and protocol faults are logged and dropped, never fatal to the loop
//! - The receive timeout drops to 100ms while events are pending

use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::config::{validate_config, ConfigError, Configuration};
use crate::http::{self, headers, status, Message};
use crate::lifecycle::RuntimeState;
use crate::net::{DatagramSocket, Endpoint, Envelope, TransportError};
use crate::observability::metrics;
use crate::routing::{extract, RouteParams};
use crate::runtime::context::{Context, TransactionError};
use crate::runtime::event::{Event, EventType};
use crate::runtime::handler::{
    EventHandler, HandlerError, HandlerRegistry, MessageHandler, RegistrationError,
};
use crate::runtime::service::Service;

/// Receive timeout while events are waiting in the queue.
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(100);

/// Log at info when the node is verbose, at debug otherwise.
macro_rules! transaction_log {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Errors that prevent a messenger from being built or started.
#[derive(Debug, thiserror::Error)]
pub enum MessengerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind receive socket: {0}")]
    Bind(#[source] TransportError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("service hook failed: {0}")]
    Service(#[from] HandlerError),

    #[error("messenger has already been started")]
    AlreadyStarted,
}

/// A node: configuration, context, handler registries and the run loop.
pub struct Messenger {
    ctx: Context,
    msg_handlers: HandlerRegistry<MessageHandler>,
    evt_handlers: HandlerRegistry<EventHandler>,
    idle_timeout: Duration,
    state: watch::Sender<RuntimeState>,
}

impl Messenger {
    /// Build a node from a validated configuration. Nothing is bound until [`Messenger::run`].
    pub fn new(config: Configuration) -> Result<Self, MessengerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let node_self = Endpoint::from_configuration(&config)?;
        let idle_timeout = config.socket_timeout();
        let (state, _) = watch::channel(RuntimeState::Created);

        Ok(Self {
            ctx: Context::new(node_self, config),
            msg_handlers: HandlerRegistry::new(),
            evt_handlers: HandlerRegistry::new(),
            idle_timeout,
            state,
        })
    }

    pub fn node_self(&self) -> &Endpoint {
        self.ctx.node_self()
    }

    pub fn configuration(&self) -> &Configuration {
        self.ctx.config()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn state_watch(&self) -> watch::Receiver<RuntimeState> {
        self.state.subscribe()
    }

    pub fn add_route<F>(&mut self, pattern: &str, handler: F)
    where
        F: for<'a> Fn(&'a mut Context, RouteParams, Message) -> BoxFuture<'a, Result<Message, HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        self.ctx.add_route(pattern, handler);
    }

    pub fn register_msg_handler<F>(&mut self, message_type: u32, handler: F) -> Result<(), RegistrationError>
    where
        F: for<'a> Fn(&'a mut Context, Message) -> BoxFuture<'a, Result<Option<Message>, HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.msg_handlers.register(message_type, handler)
    }

    /// Register under the lowest free message type, returning it.
    pub fn register_msg_handler_auto<F>(&mut self, handler: F) -> u32
    where
        F: for<'a> Fn(&'a mut Context, Message) -> BoxFuture<'a, Result<Option<Message>, HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.msg_handlers.register_auto(handler)
    }

    pub fn deregister_msg_handler(&mut self, message_type: u32) -> Result<(), RegistrationError> {
        self.msg_handlers.deregister(message_type).map(|_| ())
    }

    pub fn register_evt_handler<F>(&mut self, event_type: EventType, handler: F) -> Result<(), RegistrationError>
    where
        F: for<'a> Fn(&'a mut Context, Value) -> BoxFuture<'a, Result<(), HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.evt_handlers.register(event_type.id(), handler)
    }

    /// Register under the lowest free event type, returning it.
    pub fn register_evt_handler_auto<F>(&mut self, handler: F) -> EventType
    where
        F: for<'a> Fn(&'a mut Context, Value) -> BoxFuture<'a, Result<(), HandlerError>>
            + Send
            + Sync
            + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        EventType(self.evt_handlers.register_auto(handler))
    }

    pub fn deregister_evt_handler(&mut self, event_type: EventType) -> Result<(), RegistrationError> {
        self.evt_handlers.deregister(event_type.id()).map(|_| ())
    }

    fn set_state(&self, state: RuntimeState) {
        tracing::debug!(tag = %self.ctx.node_self().tag(), state = %state, "State transition");
        self.state.send_replace(state);
    }

    /// Run the node until it receives a terminate request.
    ///
    /// Initialization failures are returned after the state reaches `Terminated`.
    pub async fn run<S: Service>(&mut self, service: &mut S) -> Result<(), MessengerError> {
        let current = self.state();
        if current != RuntimeState::Created {
            return Err(MessengerError::AlreadyStarted);
        }

        self.set_state(RuntimeState::Initializing);
        let socket = match self.initialize(service).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(tag = %self.ctx.node_self().tag(), error = %e, "Initialization failed");
                self.ctx.running = false;
                self.ctx.release_nodes();
                self.set_state(RuntimeState::Terminated);
                return Err(e);
            }
        };

        tracing::info!(
            tag = %self.ctx.node_self().tag(),
            address = %self.ctx.node_self().address(),
            uuid = %self.ctx.uuid(),
            routes = self.ctx.router().len(),
            "Node running"
        );
        self.set_state(RuntimeState::Running);

        while self.ctx.running {
            if let Some(event) = self.ctx.events.pop() {
                if !self.process_event(event).await {
                    break;
                }
            }

            let timeout = if self.ctx.events.is_empty() {
                self.idle_timeout
            } else {
                BUSY_TIMEOUT
            };
            match socket.recv_timeout(timeout).await {
                Ok(Some(envelope)) => self.process_datagram(envelope).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(tag = %self.ctx.node_self().tag(), error = %e, "Receive failed");
                }
            }
        }

        self.set_state(RuntimeState::Draining);
        if let Err(e) = service.finalize(&mut self.ctx).await {
            tracing::warn!(tag = %self.ctx.node_self().tag(), error = %e, "Service finalize failed");
        }
        drop(socket);
        self.ctx.release_nodes();
        self.set_state(RuntimeState::Terminated);
        tracing::info!(tag = %self.ctx.node_self().tag(), "Node terminated");
        Ok(())
    }

    async fn initialize<S: Service>(&mut self, service: &mut S) -> Result<DatagramSocket, MessengerError> {
        let socket = DatagramSocket::bind(&self.ctx.node_self().address())
            .await
            .map_err(MessengerError::Bind)?;

        self.register_msg_handler(EventType::SERVICE_TERMINATE.id(), terminate_handler)?;
        self.register_evt_handler(EventType::DELETE_NODE, delete_node_handler)?;
        service.init(self)?;

        self.ctx.running = true;
        service.after_init(&mut self.ctx).await?;
        Ok(socket)
    }

    /// Handle one event. Returns `false` when the loop must stop.
    async fn process_event(&mut self, event: Event) -> bool {
        let event_type = event.event_type();
        metrics::record_event(event.name());
        transaction_log!(
            self.ctx.verbose(),
            tag = %self.ctx.node_self().tag(),
            event = %event_type,
            "Reacting to event"
        );

        if event_type == EventType::SERVICE_TERMINATE {
            self.ctx.running = false;
            return false;
        }

        match self.evt_handlers.get(event_type.id()).cloned() {
            Some(handler) => {
                if let Err(e) = handler(&mut self.ctx, event.into_params()).await {
                    tracing::warn!(
                        tag = %self.ctx.node_self().tag(),
                        event = %event_type,
                        error = %e,
                        "Event handler failed"
                    );
                }
            }
            None => {
                tracing::warn!(
                    tag = %self.ctx.node_self().tag(),
                    event = %event_type,
                    "Can't handle event type"
                );
            }
        }
        true
    }

    async fn process_datagram(&mut self, envelope: Envelope) {
        let started = Instant::now();
        let verbose = self.ctx.verbose();
        metrics::record_datagram(envelope.len());
        transaction_log!(
            verbose,
            tag = %self.ctx.node_self().tag(),
            sender = %envelope.sender(),
            bytes = envelope.len(),
            "Datagram received"
        );

        let request = match http::parse(envelope.payload()) {
            Ok(message) => message,
            Err(e) => {
                metrics::record_parse_failure();
                tracing::warn!(
                    tag = %self.ctx.node_self().tag(),
                    sender = %envelope.sender(),
                    error = %e,
                    "Dropping unparsable datagram"
                );
                tracing::debug!(payload = %envelope.to_text(), "Unparsable datagram content");
                return;
            }
        };

        if !request.headers.contains(headers::SERVICE_DST) {
            tracing::warn!(sender = %envelope.sender(), "Dropping message without destination");
            return;
        }
        let source = match request.source() {
            Some(Ok(source)) => source,
            Some(Err(e)) => {
                tracing::warn!(sender = %envelope.sender(), error = %e, "Dropping message with invalid source");
                return;
            }
            None => {
                tracing::warn!(sender = %envelope.sender(), "Dropping message without source");
                return;
            }
        };
        transaction_log!(verbose, from = %source.tag(), message = %request, "Message parsed");

        let message_type = request
            .headers
            .get(headers::APP_MESSAGE_TYPE)
            .map(|raw| raw.parse::<u32>().map_err(|_| raw.to_string()));
        let outcome = match message_type {
            Some(Ok(message_type)) => self.dispatch_message(message_type, request).await,
            Some(Err(raw)) => {
                tracing::warn!(from = %source.tag(), value = %raw, "Dropping message with invalid message type");
                return;
            }
            None => self.dispatch_route(request).await,
        };

        match outcome {
            Ok(Some(mut reply)) => {
                reply
                    .headers
                    .insert(headers::SERVICE_SRC, self.ctx.node_self().to_record());
                let reply_status = reply.status().unwrap_or_default();
                match self.ctx.commit(reply).await {
                    Ok(destination) => {
                        metrics::record_transaction(reply_status, started);
                        transaction_log!(
                            verbose,
                            tag = %self.ctx.node_self().tag(),
                            to = %destination,
                            status = reply_status,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Transaction committed"
                        );
                    }
                    Err(TransactionError::Validation(e)) => {
                        tracing::warn!(
                            tag = %self.ctx.node_self().tag(),
                            from = %source.tag(),
                            error = %e,
                            "Handler did not build a valid message"
                        );
                        self.fail(source.tag(), started).await;
                    }
                    Err(e) => {
                        tracing::warn!(tag = %self.ctx.node_self().tag(), error = %e, "Failed to commit reply");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    tag = %self.ctx.node_self().tag(),
                    from = %source.tag(),
                    error = %e,
                    "Handler failed"
                );
                self.fail(source.tag(), started).await;
            }
        }
    }

    async fn dispatch_message(
        &mut self,
        message_type: u32,
        request: Message,
    ) -> Result<Option<Message>, HandlerError> {
        transaction_log!(
            self.ctx.verbose(),
            tag = %self.ctx.node_self().tag(),
            message_type,
            name = crate::runtime::event::event_name(message_type),
            "Application message received"
        );
        match self.msg_handlers.get(message_type).cloned() {
            Some(handler) => handler(&mut self.ctx, request).await,
            None => {
                tracing::warn!(
                    tag = %self.ctx.node_self().tag(),
                    message_type,
                    "Can't handle message type"
                );
                Ok(None)
            }
        }
    }

    async fn dispatch_route(&mut self, request: Message) -> Result<Option<Message>, HandlerError> {
        let Some(path) = request.path().map(str::to_string) else {
            tracing::debug!(tag = %self.ctx.node_self().tag(), "Ignoring unsolicited response");
            return Ok(None);
        };

        let matched = self
            .ctx
            .router()
            .match_path(&path)
            .map(|route| (route.handler().clone(), extract(&path, route)));
        match matched {
            Some((handler, params)) => handler(&mut self.ctx, params, request).await.map(Some),
            None => {
                tracing::warn!(tag = %self.ctx.node_self().tag(), path = %path, "No handler for path");
                Ok(Some(request.reply(status::NOT_FOUND)))
            }
        }
    }

    /// Answer a failed transaction with a 500 to its sender, if the sender is known.
    async fn fail(&mut self, tag: &str, started: Instant) {
        match self.ctx.send_error(tag, status::INTERNAL_SERVER_ERROR).await {
            Ok(_) => metrics::record_transaction(status::INTERNAL_SERVER_ERROR, started),
            Err(e) => {
                tracing::warn!(
                    tag = %self.ctx.node_self().tag(),
                    node = %tag,
                    error = %e,
                    "Could not report failure"
                );
            }
        }
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("ctx", &self.ctx)
            .field("msg_handlers", &self.msg_handlers)
            .field("evt_handlers", &self.evt_handlers)
            .field("state", &self.state())
            .finish()
    }
}

/// Replies 200 to the sender, then stops the loop.
fn terminate_handler<'a>(
    ctx: &'a mut Context,
    request: Message,
) -> BoxFuture<'a, Result<Option<Message>, HandlerError>> {
    Box::pin(async move {
        let reply = request.reply(status::OK);
        ctx.request_termination();
        Ok(Some(reply))
    })
}

/// Removes every node listed as a record in the parameter array.
fn delete_node_handler<'a>(ctx: &'a mut Context, params: Value) -> BoxFuture<'a, Result<(), HandlerError>> {
    Box::pin(async move {
        let Value::Array(records) = params else {
            return Err(HandlerError::failed("delete-node parameters must be an array"));
        };
        for record in records {
            let Some(record) = record.as_str() else {
                tracing::warn!(record = %record, "Skipping non-string node record");
                continue;
            };
            match Endpoint::from_record(record) {
                Ok(endpoint) => {
                    let replaced = ctx
                        .find_node(endpoint.tag())
                        .is_some_and(|known| known.endpoint() != &endpoint);
                    if replaced {
                        tracing::debug!(node = %endpoint.tag(), "Keeping newer node with the same tag");
                        continue;
                    }
                    if let Err(e) = ctx.delete_node(&endpoint) {
                        tracing::debug!(node = %endpoint.tag(), error = %e, "Node already gone");
                    }
                }
                Err(e) => tracing::warn!(record = %record, error = %e, "Skipping invalid node record"),
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::service::NoService;

    fn config(port: u16) -> Configuration {
        Configuration::from_iter([
            ("self_ip", "127.0.0.1".to_string()),
            ("port", port.to_string()),
            ("tag", "unit".to_string()),
        ])
    }

    fn noop_message<'a>(
        _ctx: &'a mut Context,
        _request: Message,
    ) -> BoxFuture<'a, Result<Option<Message>, HandlerError>> {
        Box::pin(async { Ok(None) })
    }

    #[test]
    fn new_rejects_incomplete_configuration() {
        let err = Messenger::new(Configuration::from_iter([("port", "1")])).unwrap_err();
        assert!(matches!(err, MessengerError::Config(ConfigError::Validation(_))));
    }

    #[test]
    fn message_handler_registration() {
        let mut messenger = Messenger::new(config(41001)).unwrap();
        messenger.register_msg_handler(5, noop_message).unwrap();
        assert_eq!(
            messenger.register_msg_handler(5, noop_message),
            Err(RegistrationError::Duplicate(5))
        );
        assert_eq!(messenger.register_msg_handler_auto(noop_message), 1);
        assert_eq!(messenger.register_msg_handler_auto(noop_message), 2);
        messenger.deregister_msg_handler(5).unwrap();
        assert_eq!(
            messenger.deregister_msg_handler(5),
            Err(RegistrationError::Unknown(5))
        );
    }

    #[test]
    fn event_handler_registration() {
        let mut messenger = Messenger::new(config(41002)).unwrap();
        let id = messenger.register_evt_handler_auto(|_ctx, _params| Box::pin(async { Ok(()) }));
        assert_eq!(id, EventType(1));
        assert!(messenger.deregister_evt_handler(id).is_ok());
        assert_eq!(
            messenger.deregister_evt_handler(EventType(99)),
            Err(RegistrationError::Unknown(99))
        );
    }

    #[tokio::test]
    async fn bind_failure_terminates() {
        let config = Configuration::from_iter([
            ("self_ip", "203.0.113.7"),
            ("port", "41003"),
            ("tag", "unreachable"),
        ]);
        let mut messenger = Messenger::new(config).unwrap();
        let err = messenger.run(&mut NoService).await.unwrap_err();
        assert!(matches!(err, MessengerError::Bind(_)));
        assert_eq!(messenger.state(), RuntimeState::Terminated);
        assert!(matches!(
            messenger.run(&mut NoService).await,
            Err(MessengerError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn failing_setup_never_runs() {
        struct Broken;
        impl Service for Broken {
            fn after_init(
                &mut self,
                _ctx: &mut Context,
            ) -> impl std::future::Future<Output = Result<(), HandlerError>> + Send {
                async { Err(HandlerError::failed("no upstream")) }
            }
        }

        let mut messenger = Messenger::new(config(41004)).unwrap();
        let mut states = messenger.state_watch();
        let err = messenger.run(&mut Broken).await.unwrap_err();
        assert!(matches!(err, MessengerError::Service(_)));
        assert_eq!(*states.borrow_and_update(), RuntimeState::Terminated);
    }

    #[tokio::test]
    async fn delete_node_event_removes_listed_nodes() {
        let mut messenger = Messenger::new(config(41005)).unwrap();
        let endpoint = Endpoint::new("127.0.0.1", 41999, "temp_gone");
        let ctx = messenger.context_mut();
        ctx.add_node(endpoint.clone()).await.unwrap();

        let params = serde_json::json!([endpoint.to_record(), 42, "not a record"]);
        delete_node_handler(ctx, params).await.unwrap();
        assert!(ctx.find_node("temp_gone").is_none());

        assert!(delete_node_handler(ctx, serde_json::json!({})).await.is_err());
    }

    #[tokio::test]
    async fn stale_delete_keeps_reconnected_node() {
        let mut messenger = Messenger::new(config(41006)).unwrap();
        let ctx = messenger.context_mut();
        ctx.add_node(Endpoint::new("127.0.0.1", 41998, "temp_moved")).await.unwrap();

        let stale = Endpoint::new("127.0.0.1", 41997, "temp_moved");
        delete_node_handler(ctx, serde_json::json!([stale.to_record()])).await.unwrap();
        assert_eq!(ctx.find_node("temp_moved").unwrap().port(), 41998);
    }
}
