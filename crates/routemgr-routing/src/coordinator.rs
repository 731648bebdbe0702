use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use routemgr_core::{MessageRoute, ShardConfig, ShardRouteConfig};

use crate::error::RoutingError;
use crate::route::Route;
use crate::table::RouteTable;

/// Owns one [`RouteTable`] per configured shard and keeps them consistent.
///
/// Route fragments learned from peers are joined against every table, and
/// each route a join produces is offered to every table again, so a fragment
/// learned at one shard propagates across shard boundaries in a single call.
#[derive(Debug, Clone)]
pub struct TableCoordinator {
    shards: Vec<ShardConfig>,
    /// Tables in shard configuration order.
    tables: Vec<RouteTable>,
}

impl TableCoordinator {
    /// Build a table per shard and seed it with the shard's initial routes.
    pub fn new(shards: Vec<ShardConfig>) -> Result<Self, RoutingError> {
        let mut coordinator = Self {
            tables: Vec::with_capacity(shards.len()),
            shards,
        };
        for shard in &coordinator.shards {
            if coordinator.table(&shard.prefix).is_some() {
                return Err(RoutingError::DuplicateShard(shard.prefix.clone()));
            }
            coordinator
                .tables
                .push(RouteTable::new(&shard.prefix, &shard.account));
        }
        let seeds: Vec<(String, ShardRouteConfig)> = coordinator
            .shards
            .iter()
            .flat_map(|shard| {
                shard
                    .initial_table
                    .iter()
                    .map(move |route| (shard.prefix.clone(), route.clone()))
            })
            .collect();
        for (prefix, route) in &seeds {
            coordinator.add_shard_route(prefix, route)?;
        }
        Ok(coordinator)
    }

    pub fn shards(&self) -> &[ShardConfig] {
        &self.shards
    }

    pub fn tables(&self) -> &[RouteTable] {
        &self.tables
    }

    pub fn table(&self, shard_prefix: &str) -> Option<&RouteTable> {
        self.tables.iter().find(|t| t.shard_prefix() == shard_prefix)
    }

    pub fn table_mut(&mut self, shard_prefix: &str) -> Option<&mut RouteTable> {
        self.tables
            .iter_mut()
            .find(|t| t.shard_prefix() == shard_prefix)
    }

    /// Add a configured route of shard `shard_prefix` as a head route.
    pub fn add_shard_route(
        &mut self,
        shard_prefix: &str,
        route: &ShardRouteConfig,
    ) -> Result<(), RoutingError> {
        let next = self
            .shards
            .iter()
            .find(|s| s.host == route.shard)
            .ok_or_else(|| RoutingError::UnknownShardHost {
                shard: shard_prefix.to_string(),
                host: route.shard.clone(),
            })?;
        let head = Route::head(
            shard_prefix,
            &next.prefix,
            &next.host,
            &route.prefix,
            route.curve_local.clone(),
            route.local,
        );
        let table = self
            .table_mut(shard_prefix)
            .ok_or_else(|| RoutingError::UnknownTable(shard_prefix.to_string()))?;
        table.add_head_route(head);
        Ok(())
    }

    /// Ingest a route advertised by a peer. Returns the number of full routes
    /// derived across all tables.
    pub fn add_message_route(&mut self, msg: &MessageRoute, expires_at: DateTime<Utc>) -> usize {
        let mut pending = VecDeque::from([Route::from_message(msg, expires_at)]);
        let mut derived = 0;
        while let Some(tail) = pending.pop_front() {
            for table in &mut self.tables {
                if let Some(full) = table.add_tail_route(&tail) {
                    tracing::debug!(
                        shard = %table.shard_prefix(),
                        destination = %full.target_prefix,
                        epoch = full.added_during_epoch,
                        "derived route"
                    );
                    derived += 1;
                    pending.push_back(full);
                }
            }
        }
        derived
    }

    pub fn bump_by_peer(&mut self, peer: &str, now: DateTime<Utc>, hold_down: Duration) {
        for table in &mut self.tables {
            table.bump_by_peer(peer, now, hold_down);
        }
    }

    pub fn remove_expired_routes(&mut self, now: DateTime<Utc>) -> usize {
        self.remove_by(|route| route.is_expired(now))
    }

    pub fn remove_by_peer(&mut self, peer: &str) -> usize {
        self.remove_by(|route| route.foreign_peer.as_deref() == Some(peer))
    }

    pub fn remove_by_peer_destination(&mut self, peer: &str, destination: &str) -> usize {
        self.remove_by(|route| {
            route.foreign_peer.as_deref() == Some(peer) && route.target_prefix == destination
        })
    }

    fn remove_by<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Route) -> bool,
    {
        self.tables
            .iter_mut()
            .map(|table| table.remove_by(&predicate))
            .sum()
    }
}
