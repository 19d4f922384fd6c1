//! Client subsystem.
//!
//! # Data Flow
//! ```text
//! Caller (CLI, signal handler, tests)
//!     → request.rs: bind reply socket on a random port in 5050..=9090
//!     → address request from temp_<tag>, validate, serialize
//!     → send through a throwaway neighbor channel
//!     → (sync) wait for one datagram, or answer 408 on timeout
//! ```
//!
//! # Design Decisions
//! - Temporary source tags make the receiving node drop the sender after replying
//! - Usable without a running messenger

pub mod request;

pub use request::{
    async_send_request, bind_ephemeral, sync_send_request, terminate_node, ClientError,
    CLIENT_PORT_RANGE, DEFAULT_CLIENT_TIMEOUT, DEFAULT_REQUEST_PORT, DEFAULT_SERVICE_PORT,
    MAX_BIND_TRIALS,
};
