//! Internal HTTP API used by the connector shards.
//!
//! Shards announce themselves on `/internal/shard/{prefix}` and relay peer
//! routing updates on `/internal/request`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use routemgr_core::IncomingRequest;

use crate::handlers::{handle_send_request, handle_shard_online, HandlerError};
use crate::state::ManagerState;

// --- Response types ---

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct ShardStatus {
    pub prefix: String,
    pub epoch: u64,
    pub routes: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub shards: Vec<ShardStatus>,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            tracing::debug!(error = %self, "rejected internal request");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

async fn handle_shard(
    State(state): State<Arc<ManagerState>>,
    Path(shard): Path<String>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    handle_shard_online(&state, &shard).await?;
    Ok(Json(serde_json::json!({})))
}

async fn handle_request(
    State(state): State<Arc<ManagerState>>,
    payload: Result<Json<IncomingRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let Json(req) = payload?;
    handle_send_request(&state, req).await?;
    Ok(Json(serde_json::json!({})))
}

async fn handle_status(State(state): State<Arc<ManagerState>>) -> Json<StatusResponse> {
    let coordinator = state.coordinator.read().await;
    let shards = coordinator
        .tables()
        .iter()
        .map(|table| ShardStatus {
            prefix: table.shard_prefix().to_string(),
            epoch: table.epoch(),
            routes: table.len(),
        })
        .collect();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        shards,
    })
}

// --- Server ---

pub fn build_router(state: Arc<ManagerState>) -> Router {
    Router::new()
        .route("/internal/shard/{shard}", post(handle_shard))
        .route("/internal/request", post(handle_request))
        .route("/internal/status", get(handle_status))
        .with_state(state)
}

pub async fn start_api_server(
    listener: tokio::net::TcpListener,
    state: Arc<ManagerState>,
) -> anyhow::Result<()> {
    let listen_addr: SocketAddr = listener.local_addr()?;
    let app = build_router(state);
    tracing::info!(%listen_addr, "internal API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
