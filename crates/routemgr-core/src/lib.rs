//! Shared types for the sharded connector route manager.
//!
//! - [`LiquidityCurve`]: piecewise-linear price curves and their composition.
//! - [`ShardConfig`] / [`ShardRouteConfig`]: static shard descriptors.
//! - [`RoutingUpdate`], [`MessageRoute`], [`ShardRoute`]: the JSON wire shapes
//!   exchanged with peer connectors and local shards.

pub mod config;
pub mod curve;
pub mod error;
pub mod types;

pub use config::{ShardConfig, ShardRouteConfig};
pub use curve::{LiquidityCurve, Point};
pub use error::CoreError;
pub use types::{
    is_under, CustomRequest, IncomingRequest, MessageRoute, RoutingUpdate, ShardRoute,
    ShardSnapshot, BROADCAST_ROUTES_METHOD, MIN_MESSAGE_WINDOW,
};
