//! Integration test: the route manager over real HTTP.
//!
//! Two fake shards are served by one axum app that records what the route
//! manager posts to them; the route manager talks to it through
//! `HttpTransport` and receives relayed peer requests on its own API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use routemgr_integration_tests::*;
use routemgr_node::{HttpTransport, RouteManager, RouteManagerConfig};

type Recorded = Arc<Mutex<Vec<(String, Value)>>>;

async fn record(
    State(recorded): State<Recorded>,
    Path((shard, endpoint)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    recorded
        .lock()
        .unwrap()
        .push((format!("/{shard}/internal/{endpoint}"), body));
    StatusCode::OK
}

async fn start_fake_shards() -> (String, Recorded) {
    let recorded: Recorded = Arc::default();
    let app = Router::new()
        .route("/{shard}/internal/{endpoint}", post(record))
        .with_state(recorded.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), recorded)
}

fn bodies(recorded: &Recorded, path: &str) -> Vec<Value> {
    recorded
        .lock()
        .unwrap()
        .iter()
        .filter(|(p, _)| p == path)
        .map(|(_, body)| body.clone())
        .collect()
}

#[tokio::test]
async fn test_route_exchange_over_http() {
    let (base, recorded) = start_fake_shards().await;
    let config = RouteManagerConfig {
        private_port: 0,
        shards: shards(&format!("{base}/west"), &format!("{base}/east")),
        ..RouteManagerConfig::default()
    };
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(5)).unwrap());
    let mut manager = RouteManager::new(config, transport).unwrap();
    let addr = manager.start().await.unwrap();

    manager.state().broadcast_cycle().await;
    let to_west_peer = bodies(&recorded, "/west/internal/request");
    assert_eq!(to_west_peer.len(), 1);
    assert_eq!(to_west_peer[0]["to"], WEST_PEER);
    assert_eq!(to_west_peer[0]["custom"]["data"]["request_full_table"], true);
    assert_eq!(bodies(&recorded, "/east/internal/routes")[0]["all"], serde_json::json!([]));

    // East's shard relays a route advertised by its peer.
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/internal/request", addr.port()))
        .json(&relayed(EAST_PEER, &update(vec![conrad_route()], 1234)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let to_west_peer = bodies(&recorded, "/west/internal/request");
    assert_eq!(to_west_peer.len(), 2);
    let data = &to_west_peer[1]["custom"]["data"];
    assert_eq!(data["request_full_table"], false);
    assert_eq!(data["new_routes"][0]["destination_ledger"], CONRAD);

    // A shard coming online gets its table again.
    let response = client
        .post(format!(
            "http://127.0.0.1:{}/internal/shard/{WEST}",
            addr.port()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let snapshots = bodies(&recorded, "/west/internal/routes");
    assert_eq!(snapshots.len(), 3);
    assert_eq!(snapshots[2]["all"].as_array().unwrap().len(), 2);

    let response = client
        .post(format!("http://127.0.0.1:{}/internal/shard/g.nowhere.", addr.port()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    manager.shutdown().await.unwrap();
}
