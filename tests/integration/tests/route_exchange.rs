//! Integration test: route exchange between two shards and their peers.
//!
//! Drives the route manager through its request handlers and scheduler cycle
//! with an in-memory transport standing in for the shards.

use std::time::Duration;

use routemgr_core::{IncomingRequest, LiquidityCurve, MessageRoute, RoutingUpdate, ShardRouteConfig};
use routemgr_integration_tests::*;
use routemgr_node::handlers::{handle_send_request, handle_shard_online};
use routemgr_node::{BroadcastOutcome, HandlerError, ManagerState};

async fn relay(state: &ManagerState, from: &str, update: &RoutingUpdate) -> Result<(), HandlerError> {
    let request: IncomingRequest = serde_json::from_value(relayed(from, update)).unwrap();
    handle_send_request(state, request).await
}

fn west_to(destination: &str) -> MessageRoute {
    MessageRoute {
        source_ledger: WEST.into(),
        destination_ledger: destination.into(),
        source_account: "g.usd.connie.west.server".into(),
        min_message_window: 1,
        points: Some(LiquidityCurve::new(vec![[0.0, 0.0], [1000.0, 2000.0]])),
        paths: vec![vec![]],
    }
}

// =========================================================================
// Scheduler cycle
// =========================================================================

#[tokio::test]
async fn test_first_cycle_sends_full_table() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;

    assert_eq!(
        peer_updates(&transport, WEST_HOST),
        vec![RoutingUpdate {
            new_routes: vec![west_to(EAST)],
            unreachable_through_me: vec![],
            hold_down_time: 45_000,
            request_full_table: true,
        }]
    );
    // East's table is still at epoch 0, so its peer hears nothing, not an
    // empty update.
    assert!(peer_updates(&transport, EAST_HOST).is_empty());

    let snapshots = transport.requests_to(&format!("{WEST_HOST}/internal/routes"));
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].body["all"][0]["prefix"], EAST);
    assert_eq!(snapshots[0].body["all"][0]["shard"], EAST_HOST);
    let snapshots = transport.requests_to(&format!("{EAST_HOST}/internal/routes"));
    assert_eq!(snapshots[0].body, serde_json::json!({ "all": [] }));
}

#[tokio::test]
async fn test_every_cycle_refreshes_peers() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;
    state.broadcast_cycle().await;

    let updates = peer_updates(&transport, WEST_HOST);
    assert_eq!(updates.len(), 2);
    assert!(updates[1].new_routes.is_empty());
    assert!(!updates[1].request_full_table);
    // Shard snapshots are only resent when a table changes.
    assert_eq!(transport.requests_to(&format!("{WEST_HOST}/internal/routes")).len(), 1);
}

// =========================================================================
// Peer requests
// =========================================================================

#[tokio::test]
async fn test_remote_route_is_relayed_to_other_peer() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;

    relay(&state, EAST_PEER, &update(vec![conrad_route()], 1234))
        .await
        .unwrap();

    let updates = peer_updates(&transport, WEST_HOST);
    assert_eq!(updates.len(), 2);
    assert_eq!(
        updates[1],
        RoutingUpdate {
            new_routes: vec![west_to(CONRAD)],
            unreachable_through_me: vec![],
            hold_down_time: 45_000,
            request_full_table: false,
        }
    );

    let snapshots = transport.requests_to(&format!("{WEST_HOST}/internal/routes"));
    assert_eq!(snapshots.len(), 2);
    let all = snapshots[1].body["all"].as_array().unwrap().clone();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1]["prefix"], CONRAD);
    assert_eq!(all[1]["local"], false);
}

#[tokio::test]
async fn test_remote_route_expires_and_is_withdrawn() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;
    relay(&state, EAST_PEER, &update(vec![conrad_route()], 1))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    state.broadcast_cycle().await;

    let updates = peer_updates(&transport, WEST_HOST);
    assert_eq!(
        updates.last().unwrap(),
        &RoutingUpdate {
            new_routes: vec![],
            unreachable_through_me: vec![CONRAD.to_string()],
            hold_down_time: 45_000,
            request_full_table: false,
        }
    );
    let coordinator = state.coordinator.read().await;
    assert_eq!(coordinator.table(WEST).unwrap().len(), 1);
}

#[tokio::test]
async fn test_spoofed_route_is_ignored() {
    let (state, _) = manager_state();
    let mut spoofed = conrad_route();
    spoofed.source_account = "g.eur.connie.east.bob".into();
    relay(&state, EAST_PEER, &update(vec![spoofed], 1234))
        .await
        .unwrap();

    let coordinator = state.coordinator.read().await;
    let west = coordinator.table(WEST).unwrap();
    assert_eq!(west.len(), 1);
    assert_eq!(west.routes()[0].target_prefix, EAST);
}

#[tokio::test]
async fn test_rejected_request_changes_nothing() {
    let (state, transport) = manager_state();
    let mut bad = update(vec![conrad_route()], 1234);
    bad.unreachable_through_me = vec!["g.cad.conrad.east".into()];

    let err = relay(&state, EAST_PEER, &bad).await.unwrap_err();
    assert!(matches!(err, HandlerError::InvalidUpdate(_)));
    assert!(transport.requests().is_empty());
    assert_eq!(state.coordinator.read().await.table(WEST).unwrap().epoch(), 1);

    let request = IncomingRequest::default();
    assert!(matches!(
        handle_send_request(&state, request).await,
        Err(HandlerError::MissingSender)
    ));
}

#[tokio::test]
async fn test_full_table_request_resends_everything() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;
    relay(&state, EAST_PEER, &update(vec![conrad_route()], 1234))
        .await
        .unwrap();

    let mut request = update(vec![], 45_000);
    request.request_full_table = true;
    relay(&state, WEST_PEER, &request).await.unwrap();

    let updates = peer_updates(&transport, WEST_HOST);
    let last = updates.last().unwrap();
    assert!(!last.request_full_table);
    assert_eq!(last.new_routes, vec![west_to(EAST), west_to(CONRAD)]);
}

#[tokio::test]
async fn test_revised_broadcasts_are_idempotent() {
    let (state, transport) = manager_state();
    relay(&state, EAST_PEER, &update(vec![conrad_route()], 1234))
        .await
        .unwrap();
    let sent = transport.requests().len();

    for _ in 0..2 {
        let shards = state.shard_broadcaster.broadcast_to_revised_shards().await;
        let peers = state.peer_broadcaster.broadcast_to_revised_shards().await;
        assert!(shards.into_iter().chain(peers).all(|o| o == BroadcastOutcome::Skipped));
    }
    assert_eq!(transport.requests().len(), sent);
}

// =========================================================================
// Failures
// =========================================================================

#[tokio::test]
async fn test_failed_peer_is_resynced_and_purged() {
    let mut shards = shards(WEST_HOST, EAST_HOST);
    shards[1].initial_table.push(ShardRouteConfig {
        prefix: WEST.into(),
        shard: WEST_HOST.into(),
        curve_local: Some(LiquidityCurve::new(vec![[0.0, 0.0], [2000.0, 1000.0]])),
        local: true,
    });
    let (state, transport) = manager_state_with(shards);
    state.broadcast_cycle().await;
    relay(&state, EAST_PEER, &update(vec![conrad_route()], 45_000))
        .await
        .unwrap();
    assert_eq!(state.coordinator.read().await.table(WEST).unwrap().len(), 2);

    transport.set_down(EAST_HOST, true);
    state.broadcast_cycle().await;
    state.broadcast_cycle().await;

    // The route to conrad depended on east's peer.
    {
        let coordinator = state.coordinator.read().await;
        let west = coordinator.table(WEST).unwrap();
        assert!(west
            .routes()
            .iter()
            .all(|route| route.foreign_peer.as_deref() != Some(EAST_PEER)));
    }
    let withdrawn = peer_updates(&transport, WEST_HOST)
        .iter()
        .any(|u| u.unreachable_through_me == vec![CONRAD.to_string()]);
    assert!(withdrawn);

    transport.set_down(EAST_HOST, false);
    transport.clear();
    state.broadcast_cycle().await;
    let updates = peer_updates(&transport, EAST_HOST);
    assert_eq!(updates.len(), 1);
    assert!(updates[0].request_full_table);
    assert_eq!(updates[0].new_routes.len(), 1);
    assert_eq!(updates[0].new_routes[0].destination_ledger, WEST);
}

#[tokio::test]
async fn test_failed_shard_snapshot_is_retried() {
    let (state, transport) = manager_state();
    transport.set_down(WEST_HOST, true);
    state.broadcast_cycle().await;
    assert_eq!(state.shard_broadcaster.sent_epoch(WEST), None);

    transport.set_down(WEST_HOST, false);
    state.broadcast_cycle().await;
    assert_eq!(state.shard_broadcaster.sent_epoch(WEST), Some(1));
    let delivered = transport
        .requests_to(&format!("{WEST_HOST}/internal/routes"))
        .into_iter()
        .filter(|r| r.delivered)
        .count();
    assert_eq!(delivered, 1);
}

#[tokio::test]
async fn test_shard_online_always_resends() {
    let (state, transport) = manager_state();
    state.broadcast_cycle().await;
    assert_eq!(
        handle_shard_online(&state, WEST).await.unwrap(),
        BroadcastOutcome::Sent { routes: 1 }
    );
    assert_eq!(transport.requests_to(&format!("{WEST_HOST}/internal/routes")).len(), 2);
    assert!(matches!(
        handle_shard_online(&state, "g.nowhere.").await,
        Err(HandlerError::NoMatchingShard(_))
    ));
}
