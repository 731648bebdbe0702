//! State shared between the scheduler loop and the HTTP handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::RwLock;

use routemgr_core::ShardConfig;
use routemgr_routing::TableCoordinator;

use crate::peer_broadcaster::PeerBroadcaster;
use crate::shard_broadcaster::ShardBroadcaster;
use crate::transport::Transport;

/// The coordinator as shared between tasks. Never held across a send.
pub type SharedCoordinator = Arc<RwLock<TableCoordinator>>;

pub struct ManagerState {
    pub shards: Vec<ShardConfig>,
    pub coordinator: SharedCoordinator,
    pub peer_broadcaster: PeerBroadcaster,
    pub shard_broadcaster: ShardBroadcaster,
    /// When the manager started.
    pub start_time: Instant,
}

impl ManagerState {
    pub fn new(
        coordinator: TableCoordinator,
        transport: Arc<dyn Transport>,
        hold_down: Duration,
    ) -> Self {
        let shards = coordinator.shards().to_vec();
        let coordinator = Arc::new(RwLock::new(coordinator));
        Self {
            peer_broadcaster: PeerBroadcaster::new(
                shards.clone(),
                coordinator.clone(),
                transport.clone(),
                hold_down,
            ),
            shard_broadcaster: ShardBroadcaster::new(
                shards.clone(),
                coordinator.clone(),
                transport,
            ),
            shards,
            coordinator,
            start_time: Instant::now(),
        }
    }

    pub fn shard(&self, prefix: &str) -> Option<&ShardConfig> {
        self.shards.iter().find(|shard| shard.prefix == prefix)
    }

    /// One scheduler pass: drop expired routes, push changed tables to the
    /// shards, then refresh every peer.
    pub async fn broadcast_cycle(&self) {
        let expired = self
            .coordinator
            .write()
            .await
            .remove_expired_routes(Utc::now());
        if expired > 0 {
            tracing::info!(expired, "removed expired routes");
        }
        self.shard_broadcaster.broadcast_to_revised_shards().await;
        self.peer_broadcaster.broadcast_to_all_shards().await;
    }
}
