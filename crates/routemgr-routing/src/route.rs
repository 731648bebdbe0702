use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use routemgr_core::curve::join_optional;
use routemgr_core::{LiquidityCurve, MessageRoute};

/// A path segment, or a composed chain of segments, from a source ledger to a
/// destination prefix.
///
/// Conceptually the route visits
/// `source_ledger, next_ledger, [one of paths], target_prefix`, where each
/// entry of `paths` is an alternative sequence of intermediate hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Ledger through which payments enter this connector.
    pub source_ledger: String,
    /// Ledger the connector forwards payments to.
    pub next_ledger: String,
    /// Host of the shard payments are forwarded through. Peer-learned
    /// fragments that have not been joined yet have none.
    pub next_shard: Option<String>,
    /// Last ledger on this route.
    pub target_prefix: String,
    pub curve_local: Option<LiquidityCurve>,
    pub curve_remote: Option<LiquidityCurve>,
    pub curve_full: Option<LiquidityCurve>,
    pub is_local: bool,
    /// Peer connector whose advertisements keep this route alive.
    pub foreign_peer: Option<String>,
    /// `None` means the route never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Table epoch at which this route instance was created.
    pub added_during_epoch: u64,
    /// Alternate intermediate-hop sequences between `next_ledger` and `target_prefix`.
    pub paths: Vec<Vec<String>>,
}

/// Absolute deadline `hold_down` after `now`, saturating at the maximum timestamp.
pub fn expiry_after(now: DateTime<Utc>, hold_down: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(hold_down)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Route {
    /// A directly configured route. Head routes never expire.
    ///
    /// A head route covers a single hop, so its full curve is its local curve.
    pub fn head(
        source_ledger: impl Into<String>,
        next_ledger: impl Into<String>,
        next_shard: impl Into<String>,
        target_prefix: impl Into<String>,
        curve_local: Option<LiquidityCurve>,
        is_local: bool,
    ) -> Self {
        Self {
            source_ledger: source_ledger.into(),
            next_ledger: next_ledger.into(),
            next_shard: Some(next_shard.into()),
            target_prefix: target_prefix.into(),
            curve_full: curve_local.clone(),
            curve_local,
            curve_remote: None,
            is_local,
            foreign_peer: None,
            expires_at: None,
            added_during_epoch: 0,
            paths: vec![Vec::new()],
        }
    }

    /// A tail fragment built from a peer advertisement.
    pub fn from_message(msg: &MessageRoute, expires_at: DateTime<Utc>) -> Self {
        Self {
            source_ledger: msg.source_ledger.clone(),
            next_ledger: msg.destination_ledger.clone(),
            next_shard: None,
            target_prefix: msg.destination_ledger.clone(),
            curve_local: None,
            curve_remote: None,
            curve_full: msg.points.clone(),
            is_local: false,
            foreign_peer: Some(msg.source_account.clone()),
            expires_at: Some(expires_at),
            added_during_epoch: 0,
            paths: msg.paths.clone(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Push the expiry out to `now + hold_down`. No-op for never-expiring routes.
    pub fn bump_expiration(&mut self, now: DateTime<Utc>, hold_down: Duration) {
        if self.expires_at.is_some() {
            self.expires_at = Some(expiry_after(now, hold_down));
        }
    }

    /// True if this route's target and every hop sequence match `other`'s.
    /// Used to recognise a re-advertisement of a route already in a table.
    pub fn same_path_as(&self, other: &Route) -> bool {
        self.target_prefix == other.target_prefix
            && self.next_ledger == other.next_ledger
            && self.source_ledger == other.source_ledger
            && self.foreign_peer == other.foreign_peer
            && self.paths == other.paths
    }

    /// Compose `self` (head) with `tail` into a longer route stamped with
    /// `epoch`. Returns `None` if the routes are not adjacent or the result
    /// would revisit a ledger.
    pub fn join(&self, tail: &Route, epoch: u64) -> Option<Route> {
        if !can_join(self, tail) {
            return None;
        }

        // Any head path may be followed by any tail path. The boundary ledger
        // is only a separate hop when the head spans more than one hop, and the
        // tail's next ledger only when the tail does.
        let mut joint = Vec::with_capacity(2);
        if self.target_prefix != self.next_ledger {
            joint.push(self.target_prefix.clone());
        }
        if tail.target_prefix != tail.next_ledger {
            joint.push(tail.next_ledger.clone());
        }
        let paths: BTreeSet<Vec<String>> = self
            .paths
            .iter()
            .flat_map(|head_path| {
                let joint = &joint;
                tail.paths.iter().map(move |tail_path| {
                    head_path
                        .iter()
                        .chain(joint)
                        .chain(tail_path)
                        .cloned()
                        .collect::<Vec<String>>()
                })
            })
            .collect();

        let curve_remote = join_optional(self.curve_remote.as_ref(), tail.curve_full.as_ref());
        let curve_full = join_optional(self.curve_local.as_ref(), curve_remote.as_ref());

        Some(Route {
            source_ledger: self.source_ledger.clone(),
            next_ledger: self.next_ledger.clone(),
            next_shard: self.next_shard.clone(),
            target_prefix: tail.target_prefix.clone(),
            curve_local: self.curve_local.clone(),
            curve_remote,
            curve_full,
            is_local: false,
            foreign_peer: tail.foreign_peer.clone(),
            expires_at: tail.expires_at,
            added_during_epoch: epoch,
            paths: paths.into_iter().collect(),
        })
    }
}

/// Whether `head` and `tail` are adjacent and can be joined without a loop.
///
/// The joined route would visit
/// `head.source, head.next, [head paths], head.target == tail.source,
/// tail.next, [tail paths], tail.target`; no ledger may appear twice along any
/// combination of alternatives.
pub fn can_join(head: &Route, tail: &Route) -> bool {
    if head.target_prefix != tail.source_ledger {
        return false;
    }

    let mut fixed = vec![
        head.source_ledger.as_str(),
        head.next_ledger.as_str(),
        tail.target_prefix.as_str(),
    ];
    if head.target_prefix != head.next_ledger {
        fixed.push(head.target_prefix.as_str());
    }
    if tail.target_prefix != tail.next_ledger {
        fixed.push(tail.next_ledger.as_str());
    }

    let mut visited: HashSet<&str> = HashSet::with_capacity(fixed.len());
    for ledger in fixed {
        if !visited.insert(ledger) {
            return false;
        }
    }

    let head_hops = || head.paths.iter().flatten().map(String::as_str);
    if head_hops().any(|ledger| visited.contains(ledger)) {
        return false;
    }
    visited.extend(head_hops());

    !tail
        .paths
        .iter()
        .flatten()
        .any(|ledger| visited.contains(ledger.as_str()))
}
