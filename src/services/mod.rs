//! Services built on the messenger runtime.
//!
//! # Data Flow
//! ```text
//! Messenger::run(service)
//!     → Service::init: routes + handlers + extension state
//!     → Service::after_init: optional outbound setup (advertise)
//!     → loop dispatches requests to the registered routes
//!     → Service::finalize
//! ```

pub mod directory;

pub use directory::{DirectoryService, DirectoryStats, KEY_ADVERTISE_TO};
