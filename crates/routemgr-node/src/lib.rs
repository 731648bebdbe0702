//! Route manager for a sharded connector.
//!
//! The route manager keeps one routing table per connector shard, exchanges
//! routes with the peer connector on each shard's ledger, and pushes the
//! resulting tables to the shards over their internal HTTP API.

pub mod api;
pub mod config;
pub mod handlers;
pub mod node;
pub mod peer_broadcaster;
pub mod shard_broadcaster;
pub mod state;
pub mod transport;

pub use config::{ConfigError, RouteManagerConfig};
pub use handlers::HandlerError;
pub use node::RouteManager;
pub use peer_broadcaster::{BroadcastOutcome, PeerBroadcaster, PeerSyncState};
pub use shard_broadcaster::ShardBroadcaster;
pub use state::{ManagerState, SharedCoordinator};
pub use transport::{HttpTransport, MemoryTransport, Transport, TransportError};
