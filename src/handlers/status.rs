use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

use super::check_auth;

const UNPROCESSED_SCAN_LIMIT: i64 = 500;

#[derive(Serialize)]
pub struct StatusResponse {
    transport_available: bool,
    active_conversations: usize,
    unprocessed_messages: usize,
}

// GET /api/admin/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let transport_available = state.transport.is_available().await;

    let (active_conversations, unprocessed_messages) = {
        let conn = state.db.lock().unwrap();
        let active = queries::get_active_conversations(&conn)?.len();
        let unprocessed = queries::get_unprocessed_incoming(&conn, UNPROCESSED_SCAN_LIMIT)?.len();
        (active, unprocessed)
    };

    Ok(Json(StatusResponse {
        transport_available,
        active_conversations,
        unprocessed_messages,
    }))
}
