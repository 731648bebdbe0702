//! Request handlers behind the internal API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use routemgr_core::{CoreError, IncomingRequest, RoutingUpdate, BROADCAST_ROUTES_METHOD};

use crate::peer_broadcaster::BroadcastOutcome;
use crate::state::ManagerState;

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("no matching shard found")]
    NoMatchingShard(String),

    #[error("missing message.from")]
    MissingSender,

    #[error("unexpected request type")]
    UnexpectedRequestType,

    #[error("{0}")]
    InvalidUpdate(#[from] CoreError),

    /// The body was not a JSON request envelope.
    #[error("{0}")]
    MalformedRequest(#[from] JsonRejection),
}

impl HandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::NoMatchingShard(_) => StatusCode::NOT_FOUND,
            HandlerError::MalformedRequest(rejection) => rejection.status(),
            HandlerError::MissingSender
            | HandlerError::UnexpectedRequestType
            | HandlerError::InvalidUpdate(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// A shard came online: send it its full table.
pub async fn handle_shard_online(
    state: &ManagerState,
    shard_prefix: &str,
) -> Result<BroadcastOutcome, HandlerError> {
    let shard = state
        .shard(shard_prefix)
        .ok_or_else(|| HandlerError::NoMatchingShard(shard_prefix.to_string()))?;
    tracing::info!(shard = %shard_prefix, "shard online");
    Ok(state.shard_broadcaster.broadcast_to_shard(shard).await)
}

/// A shard relayed a routing update from its peer connector.
///
/// The update is applied, then every shard and peer whose table changed is
/// brought up to date before responding.
pub async fn handle_send_request(
    state: &ManagerState,
    request: IncomingRequest,
) -> Result<(), HandlerError> {
    let from = request
        .from
        .filter(|from| !from.is_empty())
        .ok_or(HandlerError::MissingSender)?;
    let custom = request
        .custom
        .filter(|custom| custom.method == BROADCAST_ROUTES_METHOD)
        .ok_or(HandlerError::UnexpectedRequestType)?;
    let update = RoutingUpdate::from_value(custom.data)?;

    state.peer_broadcaster.receive_from_shard(&from, &update).await;
    state.shard_broadcaster.broadcast_to_revised_shards().await;
    state.peer_broadcaster.broadcast_to_revised_shards().await;
    Ok(())
}
