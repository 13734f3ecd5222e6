use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

/// Request body for `POST /messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Chat payload to author, sign, and broadcast.
    pub content: String,
}

/// Response body for `POST /messages`.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub status: &'static str,
    pub message_id: String,
}

/// `POST /messages`
///
/// Authors, signs, and broadcasts a chat message through the embedded
/// node. The `202 Accepted` only reflects broadcast submission; the
/// message is committed when a leader's turn ends.
pub async fn send_message(
    State(state): State<SharedState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), (StatusCode, String)> {
    if body.content.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "empty message content".to_string()));
    }

    let message_id = state
        .node
        .send_message(body.content)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SendMessageResponse {
            status: "queued",
            message_id,
        }),
    ))
}
