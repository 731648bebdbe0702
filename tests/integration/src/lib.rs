//! Fixtures shared by the integration scenarios: a two-shard connector
//! (USD "west" and EUR "east") and helpers to inspect recorded traffic.

use std::sync::Arc;
use std::time::Duration;

use routemgr_core::{LiquidityCurve, MessageRoute, RoutingUpdate, ShardConfig, ShardRouteConfig};
use routemgr_node::{ManagerState, MemoryTransport};
use routemgr_routing::TableCoordinator;

pub const WEST: &str = "g.usd.connie.west.";
pub const EAST: &str = "g.eur.connie.east.";
pub const CONRAD: &str = "g.cad.conrad.east.";
pub const WEST_HOST: &str = "http://connie-west";
pub const EAST_HOST: &str = "http://connie-east";
pub const WEST_PEER: &str = "g.usd.connie.west.client";
pub const EAST_PEER: &str = "g.eur.connie.east.server";
pub const HOLD_DOWN: Duration = Duration::from_millis(45_000);

/// West routes to east locally; east has no configured routes.
pub fn shards(west_host: &str, east_host: &str) -> Vec<ShardConfig> {
    vec![
        ShardConfig {
            prefix: WEST.into(),
            host: west_host.into(),
            account: "g.usd.connie.west.server".into(),
            peer_account: WEST_PEER.into(),
            initial_table: vec![ShardRouteConfig {
                prefix: EAST.into(),
                shard: east_host.into(),
                curve_local: Some(LiquidityCurve::new(vec![[0.0, 0.0], [1000.0, 2000.0]])),
                local: true,
            }],
        },
        ShardConfig {
            prefix: EAST.into(),
            host: east_host.into(),
            account: "g.eur.connie.east.client".into(),
            peer_account: EAST_PEER.into(),
            initial_table: vec![],
        },
    ]
}

pub fn manager_state() -> (Arc<ManagerState>, Arc<MemoryTransport>) {
    manager_state_with(shards(WEST_HOST, EAST_HOST))
}

pub fn manager_state_with(shards: Vec<ShardConfig>) -> (Arc<ManagerState>, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    let coordinator = TableCoordinator::new(shards).expect("fixture shards are valid");
    let state = Arc::new(ManagerState::new(coordinator, transport.clone(), HOLD_DOWN));
    (state, transport)
}

/// East's peer advertising a route to conrad.
pub fn conrad_route() -> MessageRoute {
    MessageRoute {
        source_ledger: EAST.into(),
        destination_ledger: CONRAD.into(),
        source_account: EAST_PEER.into(),
        min_message_window: 1,
        points: None,
        paths: vec![vec![]],
    }
}

pub fn update(new_routes: Vec<MessageRoute>, hold_down_time: u64) -> RoutingUpdate {
    RoutingUpdate {
        new_routes,
        unreachable_through_me: vec![],
        hold_down_time,
        request_full_table: false,
    }
}

/// The relayed peer request a shard posts to `/internal/request`.
pub fn relayed(from: &str, update: &RoutingUpdate) -> serde_json::Value {
    serde_json::json!({
        "from": from,
        "custom": { "method": "broadcast_routes", "data": update }
    })
}

/// Routing updates delivered to the peer behind the shard at `host`, in order.
pub fn peer_updates(transport: &MemoryTransport, host: &str) -> Vec<RoutingUpdate> {
    transport
        .requests_to(&format!("{host}/internal/request"))
        .into_iter()
        .filter(|request| request.delivered)
        .map(|request| {
            serde_json::from_value(request.body["custom"]["data"].clone())
                .expect("broadcast body carries a routing update")
        })
        .collect()
}
