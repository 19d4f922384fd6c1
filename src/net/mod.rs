//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming datagram
//!     → socket.rs (timeout-bounded receive on the node address)
//!     → envelope.rs (raw bytes + sender)
//!     → Hand off to the protocol codec
//!
//! Outgoing reply
//!     → neighbor.rs (connected channel owned by a known node)
//!     → socket.rs (send)
//! ```
//!
//! # Design Decisions
//! - Unreliable, at-most-once, single-hop delivery
//! - Nodes are identified by tag (endpoint.rs); addresses are only used to connect
//! - One outbound channel per neighbor, released with the neighbor

pub mod endpoint;
pub mod envelope;
pub mod neighbor;
pub mod socket;

pub use endpoint::{Endpoint, EndpointError, NodeEntry, EPHEMERAL_PREFIX};
pub use envelope::Envelope;
pub use neighbor::Neighbor;
pub use socket::{DatagramSocket, TransportError};
