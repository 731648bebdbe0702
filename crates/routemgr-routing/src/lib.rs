//! Route manager routing layer.
//!
//! This crate provides:
//! - [`Route`]: a path segment with path-vector loop detection and the join algebra.
//! - [`RouteTable`]: the epoch-versioned routes of one shard.
//! - [`TableCoordinator`]: all shard tables, seeded from configuration and fed
//!   by peer advertisements with transitive propagation.

pub mod coordinator;
pub mod error;
pub mod route;
pub mod table;

// Re-exports for convenience.
pub use coordinator::TableCoordinator;
pub use error::RoutingError;
pub use route::{can_join, expiry_after, Route};
pub use table::RouteTable;
