//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Messenger states (state.rs):
//!     Created → Initializing → Running → Draining → Terminated
//!     (failed initialization: Initializing → Terminated)
//!
//! Signals (signals.rs):
//!     Ctrl+C → terminate message to the local node → loop drains
//! ```
//!
//! # Design Decisions
//! - State changes are published on a `watch` channel; observers never block the loop
//! - Shutdown travels through the normal message path

pub mod signals;
pub mod state;

pub use signals::terminate_on_ctrl_c;
pub use state::{wait_for_state, RuntimeState};
