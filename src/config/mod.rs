//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, flatten to string keys)
//!     → validation.rs (semantic checks)
//!     → Configuration (validated, immutable)
//!     → handed to the Messenger and to the service
//! ```
//!
//! # Design Decisions
//! - Config is a flat string map, so services can carry their own keys
//! - Only `self_ip`, `port` and `tag` are required; everything else has a default
//! - Validation separates syntactic (toml) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    Configuration, KEY_LOG_LEVEL, KEY_METRICS_ADDRESS, KEY_PORT, KEY_SELF_IP,
    KEY_SOCKET_TIMEOUT_MS, KEY_TAG, KEY_VERBOSE,
};
pub use validation::{validate_config, ValidationIssue};
