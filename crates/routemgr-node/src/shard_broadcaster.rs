//! Pushes routing tables to the local connector shards.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use serde_json::json;

use routemgr_core::{ShardConfig, ShardSnapshot};

use crate::peer_broadcaster::BroadcastOutcome;
use crate::state::SharedCoordinator;
use crate::transport::Transport;

/// Sends each shard a full snapshot of its table whenever the table's epoch
/// moved since the last accepted snapshot.
pub struct ShardBroadcaster {
    shards: Vec<ShardConfig>,
    coordinator: SharedCoordinator,
    transport: Arc<dyn Transport>,
    /// Epoch of the last snapshot each shard accepted, keyed by shard prefix.
    shard_epochs: DashMap<String, u64>,
}

impl ShardBroadcaster {
    pub fn new(
        shards: Vec<ShardConfig>,
        coordinator: SharedCoordinator,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            shards,
            coordinator,
            transport,
            shard_epochs: DashMap::new(),
        }
    }

    pub fn sent_epoch(&self, shard_prefix: &str) -> Option<u64> {
        self.shard_epochs.get(shard_prefix).map(|epoch| *epoch)
    }

    pub async fn broadcast_to_revised_shards(&self) -> Vec<BroadcastOutcome> {
        join_all(
            self.shards
                .iter()
                .map(|shard| self.broadcast_to_revised_shard(shard)),
        )
        .await
    }

    pub async fn broadcast_to_revised_shard(&self, shard: &ShardConfig) -> BroadcastOutcome {
        let current = {
            let coordinator = self.coordinator.read().await;
            coordinator.table(&shard.prefix).map(|table| table.epoch())
        };
        if current.is_some() && self.sent_epoch(&shard.prefix) == current {
            return BroadcastOutcome::Skipped;
        }
        self.broadcast_to_shard(shard).await
    }

    /// Send the shard its full table, even if it has not changed.
    pub async fn broadcast_to_shard(&self, shard: &ShardConfig) -> BroadcastOutcome {
        let (epoch, routes) = {
            let coordinator = self.coordinator.read().await;
            let Some(table) = coordinator.table(&shard.prefix) else {
                tracing::warn!(shard = %shard.prefix, "no routing table for shard");
                return BroadcastOutcome::Skipped;
            };
            (table.epoch(), table.shard_routes())
        };

        let count = routes.len();
        let url = format!("{}/internal/routes", shard.host);
        let body = json!(ShardSnapshot { all: routes });
        match self.transport.post_json(&url, &body).await {
            Ok(()) => {
                tracing::info!(shard = %shard.prefix, epoch, routes = count, "broadcast ok");
                self.shard_epochs.insert(shard.prefix.clone(), epoch);
                BroadcastOutcome::Sent { routes: count }
            }
            Err(e) => {
                tracing::warn!(shard = %shard.prefix, error = %e, "broadcast to shard failed");
                self.shard_epochs.remove(&shard.prefix);
                BroadcastOutcome::Failed
            }
        }
    }
}
