use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::services::dispatch::SendResult;
use crate::state::AppState;

use super::check_auth;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub phone_number: String,
    pub content: String,
}

// POST /api/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let result = state
        .dispatcher
        .send_message(&payload.phone_number, &payload.content)
        .await;

    Ok(match result {
        SendResult::Sent { message_id } => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "success": true,
                "message_id": message_id,
            })),
        )
            .into_response(),
        SendResult::Failed { error } => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "success": false,
                "error": error,
            })),
        )
            .into_response(),
    })
}
