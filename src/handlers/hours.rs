use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::hours::{day_name, parse_day};
use crate::models::BusinessHours;
use crate::state::AppState;

use super::check_auth;

#[derive(Serialize)]
pub struct HoursResponse {
    day: String,
    hours: String,
    is_closed: bool,
    open_time: Option<String>,
    close_time: Option<String>,
    timezone: String,
}

impl From<BusinessHours> for HoursResponse {
    fn from(entry: BusinessHours) -> Self {
        Self {
            day: day_name(entry.day_of_week).to_string(),
            hours: entry.formatted_hours(),
            is_closed: entry.is_closed,
            open_time: entry.open_time.map(|t| t.format("%H:%M").to_string()),
            close_time: entry.close_time.map(|t| t.format("%H:%M").to_string()),
            timezone: entry.timezone,
        }
    }
}

// GET /api/admin/hours
pub async fn list_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<HoursResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let all = {
        let conn = state.db.lock().unwrap();
        queries::get_all_business_hours(&conn)?
    };

    Ok(Json(all.into_iter().map(HoursResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct UpsertHoursRequest {
    pub day_of_week: String,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    #[serde(default)]
    pub is_closed: bool,
    pub timezone: Option<String>,
}

// PUT /api/admin/hours
pub async fn upsert_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<UpsertHoursRequest>,
) -> Result<Json<HoursResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let day = parse_day(&payload.day_of_week)?;
    let timezone = payload
        .timezone
        .unwrap_or_else(|| "America/Bogota".to_string());

    let entry = if payload.is_closed {
        BusinessHours::closed(
            uuid::Uuid::new_v4().to_string(),
            day,
            timezone,
            state.clock.now(),
        )
    } else {
        BusinessHours::new(
            uuid::Uuid::new_v4().to_string(),
            day,
            payload.open_time.as_deref().map(parse_hhmm).transpose()?,
            payload.close_time.as_deref().map(parse_hhmm).transpose()?,
            false,
            timezone,
            state.clock.now(),
        )?
    };

    {
        let conn = state.db.lock().unwrap();
        queries::save_business_hours(&conn, &entry)?;
    }

    Ok(Json(HoursResponse::from(entry)))
}

// DELETE /api/admin/hours/:day
pub async fn delete_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(day): Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let day = parse_day(&day)?;
    let deleted = {
        let conn = state.db.lock().unwrap();
        queries::delete_business_hours(&conn, day)?
    };

    if !deleted {
        return Err(AppError::NotFound(format!("hours for {}", day_name(day))));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| AppError::InvalidRequest(format!("invalid time: {s}")))
}
