use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use routemgr_core::{is_under, MessageRoute, ShardRoute, MIN_MESSAGE_WINDOW};

use crate::route::Route;

/// The current routes of one shard.
///
/// Every structural change (add or remove) advances the table's epoch, and
/// every route remembers the epoch it was created in, so consumers can export
/// exactly the routes a given peer has not seen yet.
#[derive(Debug, Clone)]
pub struct RouteTable {
    shard_prefix: String,
    shard_account: String,
    routes: Vec<Route>,
    /// Directly configured routes, in configuration order.
    head_routes: Vec<Route>,
    epoch: u64,
    /// Destinations whose last route was removed since the last drain.
    lost_ledgers: BTreeSet<String>,
    dst_counts: HashMap<String, usize>,
}

impl RouteTable {
    /// Create an empty table for the shard owning `shard_prefix`.
    pub fn new(shard_prefix: impl Into<String>, shard_account: impl Into<String>) -> Self {
        Self {
            shard_prefix: shard_prefix.into(),
            shard_account: shard_account.into(),
            routes: Vec::new(),
            head_routes: Vec::new(),
            epoch: 0,
            lost_ledgers: BTreeSet::new(),
            dst_counts: HashMap::new(),
        }
    }

    pub fn shard_prefix(&self) -> &str {
        &self.shard_prefix
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn head_routes(&self) -> &[Route] {
        &self.head_routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn add_head_route(&mut self, mut route: Route) {
        self.epoch += 1;
        route.added_during_epoch = self.epoch;
        self.count_destination(&route.target_prefix);
        self.head_routes.push(route.clone());
        self.routes.push(route);
    }

    /// Join `tail` onto the first head route whose target covers the tail's
    /// source ledger.
    ///
    /// Returns the new full route so the caller can offer it to other tables.
    /// A route identical to one already held only refreshes the existing
    /// entry; if its curves changed the entry is replaced and returned.
    pub fn add_tail_route(&mut self, tail: &Route) -> Option<Route> {
        let head = self
            .head_routes
            .iter()
            .find(|head| is_under(&tail.source_ledger, &head.target_prefix))?;
        let next_epoch = self.epoch + 1;
        let full = head.join(tail, next_epoch)?;

        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.foreign_peer.is_some() && r.same_path_as(&full))
        {
            existing.expires_at = full.expires_at;
            if existing.curve_full == full.curve_full && existing.curve_remote == full.curve_remote {
                return None;
            }
            tracing::debug!(
                shard = %self.shard_prefix,
                destination = %full.target_prefix,
                "route re-advertised with new curve"
            );
            self.epoch = next_epoch;
            *existing = full.clone();
            return Some(full);
        }

        self.epoch = next_epoch;
        self.count_destination(&full.target_prefix);
        self.routes.push(full.clone());
        Some(full)
    }

    /// Full snapshot of the table in the shape local shards consume.
    pub fn shard_routes(&self) -> Vec<ShardRoute> {
        self.routes
            .iter()
            .map(|route| ShardRoute {
                prefix: route.target_prefix.clone(),
                shard: route.next_shard.clone().unwrap_or_default(),
                curve_local: route.curve_local.clone(),
                curve_remote: route.curve_remote.clone(),
                local: route.is_local,
            })
            .collect()
    }

    /// Routes created after `since` (all routes when `None`), in the shape
    /// advertised to peer connectors.
    pub fn message_routes(&self, since: Option<u64>) -> Vec<MessageRoute> {
        self.routes
            .iter()
            .filter(|route| since.map_or(true, |epoch| route.added_during_epoch > epoch))
            .map(|route| MessageRoute {
                source_ledger: self.shard_prefix.clone(),
                destination_ledger: route.target_prefix.clone(),
                source_account: self.shard_account.clone(),
                min_message_window: MIN_MESSAGE_WINDOW,
                points: route.curve_full.clone(),
                paths: route.paths.clone(),
            })
            .collect()
    }

    /// Refresh the expiry of every route kept alive by `peer`.
    pub fn bump_by_peer(&mut self, peer: &str, now: DateTime<Utc>, hold_down: Duration) {
        self.routes
            .iter_mut()
            .filter(|route| route.foreign_peer.as_deref() == Some(peer))
            .for_each(|route| route.bump_expiration(now, hold_down));
    }

    /// Remove every route matching `predicate`, advancing the epoch once per
    /// removal. Returns the number of routes removed.
    pub fn remove_by<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Route) -> bool,
    {
        let mut removed = Vec::new();
        self.routes.retain(|route| {
            if predicate(route) {
                removed.push(route.target_prefix.clone());
                false
            } else {
                true
            }
        });
        for destination in &removed {
            self.epoch += 1;
            self.uncount_destination(destination);
        }
        removed.len()
    }

    /// Drain the destinations that became unreachable since the last call.
    pub fn take_lost_ledgers(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lost_ledgers).into_iter().collect()
    }

    fn count_destination(&mut self, destination: &str) {
        *self.dst_counts.entry(destination.to_string()).or_insert(0) += 1;
    }

    fn uncount_destination(&mut self, destination: &str) {
        let count = self.dst_counts.entry(destination.to_string()).or_insert(0);
        *count = count.saturating_sub(1);
        if *count == 0 {
            tracing::debug!(shard = %self.shard_prefix, %destination, "destination lost");
            self.lost_ledgers.insert(destination.to_string());
        }
    }
}
