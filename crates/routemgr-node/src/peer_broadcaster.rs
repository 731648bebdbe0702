//! Route exchange with peer connectors.
//!
//! Each shard faces exactly one peer connector on its ledger. The
//! [`PeerBroadcaster`] remembers, per peer, which table epoch it last
//! delivered and whether the peer has ever received a full table, and sends
//! only the routes added since. Updates from peers come back through
//! [`PeerBroadcaster::receive_from_shard`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::join_all;
use serde_json::json;

use routemgr_core::{is_under, RoutingUpdate, ShardConfig, BROADCAST_ROUTES_METHOD};
use routemgr_routing::expiry_after;

use crate::state::SharedCoordinator;
use crate::transport::Transport;

/// What a single broadcast attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Nothing to send: the table is empty or unchanged.
    Skipped,
    /// The request was accepted.
    Sent { routes: usize },
    /// The request failed; the target will be resynchronized.
    Failed,
}

/// What the route manager knows about a peer's copy of a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerSyncState {
    /// Epoch of the last update the peer accepted; `None` forces a full send.
    pub sent_epoch: Option<u64>,
    /// Whether the peer has accepted a full table since the last failure.
    pub has_full_table: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct PeerEntry {
    state: PeerSyncState,
    /// Bumped on every full-table request from the peer.
    full_table_requests: u64,
}

pub struct PeerBroadcaster {
    shards: Vec<ShardConfig>,
    coordinator: SharedCoordinator,
    transport: Arc<dyn Transport>,
    hold_down: Duration,
    /// Keyed by peer account.
    peers: DashMap<String, PeerEntry>,
}

impl PeerBroadcaster {
    pub fn new(
        shards: Vec<ShardConfig>,
        coordinator: SharedCoordinator,
        transport: Arc<dyn Transport>,
        hold_down: Duration,
    ) -> Self {
        Self {
            shards,
            coordinator,
            transport,
            hold_down,
            peers: DashMap::new(),
        }
    }

    pub fn sync_state(&self, peer_account: &str) -> PeerSyncState {
        self.peer_entry(peer_account).state
    }

    fn peer_entry(&self, peer_account: &str) -> PeerEntry {
        self.peers
            .get(peer_account)
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    /// Send every shard's peer an update, changed or not. Refreshes the
    /// hold-down of routes the peers learned from us.
    pub async fn broadcast_to_all_shards(&self) -> Vec<BroadcastOutcome> {
        join_all(self.shards.iter().map(|shard| self.broadcast_to_shard(shard))).await
    }

    /// Send an update only to peers whose table advanced since the last send.
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
        if current.is_some() && self.sync_state(&shard.peer_account).sent_epoch == current {
            return BroadcastOutcome::Skipped;
        }
        self.broadcast_to_shard(shard).await
    }

    pub async fn broadcast_to_shard(&self, shard: &ShardConfig) -> BroadcastOutcome {
        let PeerEntry {
            state,
            full_table_requests,
        } = self.peer_entry(&shard.peer_account);

        let (epoch, update) = {
            let mut coordinator = self.coordinator.write().await;
            let Some(table) = coordinator.table_mut(&shard.prefix) else {
                tracing::warn!(shard = %shard.prefix, "no routing table for shard");
                return BroadcastOutcome::Skipped;
            };
            let epoch = table.epoch();
            if epoch == 0 {
                return BroadcastOutcome::Skipped;
            }
            let update = RoutingUpdate {
                new_routes: table.message_routes(state.sent_epoch),
                unreachable_through_me: table.take_lost_ledgers(),
                hold_down_time: u64::try_from(self.hold_down.as_millis()).unwrap_or(u64::MAX),
                request_full_table: !state.has_full_table,
            };
            (epoch, update)
        };

        let routes = update.new_routes.len();
        let lost = update.unreachable_through_me.len();
        let body = json!({
            "to": shard.peer_account,
            "custom": {
                "method": BROADCAST_ROUTES_METHOD,
                "data": update,
            },
        });
        let url = format!("{}/internal/request", shard.host);

        match self.transport.post_json(&url, &body).await {
            Ok(()) => {
                tracing::debug!(
                    peer = %shard.peer_account,
                    epoch,
                    routes,
                    lost,
                    "broadcast routes to peer"
                );
                {
                    let mut entry = self.peers.entry(shard.peer_account.clone()).or_default();
                    entry.state.has_full_table = true;
                    // A full-table request received during the send keeps the
                    // epoch unknown.
                    if entry.full_table_requests == full_table_requests {
                        entry.state.sent_epoch = Some(epoch);
                    }
                }
                BroadcastOutcome::Sent { routes }
            }
            Err(e) => {
                self.peers
                    .entry(shard.peer_account.clone())
                    .or_default()
                    .state = PeerSyncState::default();
                let removed = self
                    .coordinator
                    .write()
                    .await
                    .remove_by_peer(&shard.peer_account);
                tracing::warn!(
                    peer = %shard.peer_account,
                    error = %e,
                    removed,
                    "failed to broadcast routes to peer"
                );
                BroadcastOutcome::Failed
            }
        }
    }

    /// Apply an update sent by peer `sender`. Returns the number of routes
    /// derived from it.
    pub async fn receive_from_shard(&self, sender: &str, update: &RoutingUpdate) -> usize {
        self.receive_from_shard_at(sender, update, Utc::now()).await
    }

    pub async fn receive_from_shard_at(
        &self,
        sender: &str,
        update: &RoutingUpdate,
        now: DateTime<Utc>,
    ) -> usize {
        let hold_down = Duration::from_millis(update.hold_down_time);
        let expires_at = expiry_after(now, hold_down);

        let derived = {
            let mut coordinator = self.coordinator.write().await;
            for destination in &update.unreachable_through_me {
                coordinator.remove_by_peer_destination(sender, destination);
            }

            let mut derived = 0;
            for route in &update.new_routes {
                if route.source_account != sender {
                    tracing::debug!(
                        %sender,
                        source_account = %route.source_account,
                        "ignoring route advertised on behalf of another account"
                    );
                    continue;
                }
                if !is_under(&route.source_account, &route.source_ledger) {
                    tracing::debug!(
                        %sender,
                        source_ledger = %route.source_ledger,
                        "ignoring route whose account is not on its source ledger"
                    );
                    continue;
                }
                derived += coordinator.add_message_route(route, expires_at);
            }

            coordinator.bump_by_peer(sender, now, hold_down);
            derived
        };

        if update.request_full_table {
            let mut entry = self.peers.entry(sender.to_string()).or_default();
            entry.state.sent_epoch = None;
            entry.full_table_requests += 1;
        }

        tracing::debug!(
            %sender,
            received = update.new_routes.len(),
            withdrawn = update.unreachable_through_me.len(),
            derived,
            "received routes from peer"
        );
        derived
    }
}
