use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Liveness summary for the gateway and its embedded node.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node_id: String,
    pub phase: String,
    pub chain_length: usize,
}

/// `GET /health`
///
/// Round-trips through the node's event loop and reports its rotation
/// view, so "healthy" means the mailbox is being drained, not just that
/// the HTTP server is up. A node whose loop has stopped yields `503`.
pub async fn health(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<HealthResponse>), (StatusCode, String)> {
    let status = state
        .node
        .get_state()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            node_id: status.node_id,
            phase: status.phase.to_string(),
            chain_length: status.blockchain_length,
        }),
    ))
}
