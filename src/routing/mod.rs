//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (strip query, filter by depth, first match by registration order)
//!     → matcher.rs (segment-wise literal / wildcard comparison)
//!     → params.rs (parameter values + per-segment query parameters)
//!     → Return: matched Route + RouteParams, or None (caller answers 404)
//!
//! Route registration:
//!     pattern "/api/v1/sync_relay/{imsi}"
//!     → matcher.rs compile (segments, depth, parameter positions)
//!     → appended to the router
//! ```
//!
//! # Design Decisions
//! - Append-only, no removal; registration order is match priority
//! - No regex; `{name}` is the only wildcard form
//! - Generic over the handler type so the table can be tested without a runtime

pub mod matcher;
pub mod params;
pub mod router;

pub use matcher::{compile, CompiledRoute, RouteParameter, Segment};
pub use params::{extract, form_get_request, Query, QueryValue, RouteParam, RouteParams};
pub use router::{Route, Router};
