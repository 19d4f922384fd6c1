//! Node runtime subsystem.
//!
//! # Data Flow
//! ```text
//! Loop iteration (messenger.rs):
//!     → pop one event (event.rs) → event handler (handler.rs)
//!     → receive one datagram (timeout 100ms if events remain, else idle timeout)
//!     → parse → application-messagetype ? message handler : router + route handler
//!     → reply gets application-src = self
//!     → context.rs commit (validate, resolve destination, send, clean up ephemeral node)
//!     → on handler failure: 500 to the sender, if it is a known node
//!
//! Node membership (nodes.rs):
//!     add (connect neighbor) / delete (drop neighbor) / find by tag
//! ```
//!
//! # Design Decisions
//! - Single-threaded cooperative loop; handlers get `&mut Context`, no locks
//! - Handlers are stored as `Arc<dyn Fn>` returning boxed futures
//! - Built-ins: terminate message handler (type 10001), delete-node event handler (10002)
//! - Service state lives in `Context::extensions`

pub mod context;
pub mod event;
pub mod handler;
pub mod messenger;
pub mod nodes;
pub mod service;

pub use context::{Context, Extensions, TransactionError};
pub use event::{event_name, Event, EventQueue, EventType, EVENT_PATH};
pub use handler::{
    EventHandler, HandlerError, HandlerRegistry, MessageHandler, RegistrationError, RouteHandler,
};
pub use messenger::{Messenger, MessengerError, BUSY_TIMEOUT};
pub use nodes::{NodeError, NodeTable};
pub use service::{NoService, Service};
