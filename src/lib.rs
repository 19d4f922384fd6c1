//! UDP inter-node messaging runtime.
//!
//! Nodes exchange HTTP-shaped messages over single datagrams, route requests
//! by path to async handlers, and keep a table of neighbor nodes reachable by
//! tag. A node runs one cooperative loop that interleaves queued local events
//! with incoming datagrams.

pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod runtime;
pub mod services;

pub use config::Configuration;
pub use http::{Message, Method};
pub use lifecycle::RuntimeState;
pub use net::Endpoint;
pub use runtime::{Context, Messenger, MessengerError, Service};
