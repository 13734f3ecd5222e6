use axum::{Json, extract::State, http::StatusCode};

use pot_chain::{Blockchain, NodeStatus};

use crate::state::SharedState;

/// `GET /chain`
///
/// Returns the node's current blockchain snapshot, genesis first.
pub async fn get_chain(
    State(state): State<SharedState>,
) -> Result<Json<Blockchain>, (StatusCode, String)> {
    state
        .node
        .get_blockchain()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

/// `GET /state`
///
/// Returns the node's rotation view: phase, current leader, chain
/// length, and pending pool size.
pub async fn get_state(
    State(state): State<SharedState>,
) -> Result<Json<NodeStatus>, (StatusCode, String)> {
    state
        .node
        .get_state()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}
