//! Support chat route handler.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use pizza_time_core::{ChatReply, ChatRequest};

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Chat reply. The text is repeated in `message` for older clients.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub data: ChatReply,
    pub message: String,
}

/// Relay a chat message to the model.
///
/// POST /api/chat/message
#[instrument(skip(state, body), fields(history_len = body.history.len()))]
pub async fn message(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }

    let reply = state.chat().reply(&body.message, &body.history).await?;
    Ok(Json(ChatResponse {
        success: true,
        data: ChatReply {
            message: reply.clone(),
        },
        message: reply,
    }))
}
