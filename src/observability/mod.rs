//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Messenger loop, context, node table, client:
//!     → logging.rs (tracing events with `tag = %…` fields)
//!     → metrics.rs (datagrams, parse failures, transactions, events, known nodes)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or `log_level`)
//!     → Prometheus scrape endpoint, when `metrics_address` is set
//! ```
//!
//! # Design Decisions
//! - Per-transaction logs are `debug` unless the node is `verbose`
//! - Recording is a no-op until an exporter is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
