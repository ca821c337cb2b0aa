use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{KeywordRule, TriggerType};
use crate::state::AppState;

use super::check_auth;

#[derive(Serialize)]
pub struct RuleResponse {
    id: String,
    keywords: Vec<String>,
    response_template: String,
    is_active: bool,
    priority: i32,
    fuzzy_match: bool,
    trigger_type: String,
    variables: Option<HashMap<String, serde_json::Value>>,
    created_at: String,
}

impl From<KeywordRule> for RuleResponse {
    fn from(rule: KeywordRule) -> Self {
        Self {
            id: rule.id,
            keywords: rule.keywords,
            response_template: rule.response_template,
            is_active: rule.is_active,
            priority: rule.priority,
            fuzzy_match: rule.fuzzy_match,
            trigger_type: rule.trigger_type.as_str().to_string(),
            variables: rule.variables,
            created_at: rule.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

#[derive(Deserialize)]
pub struct RulesQuery {
    pub keyword: Option<String>,
}

// GET /api/admin/rules
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RulesQuery>,
) -> Result<Json<Vec<RuleResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let rules = {
        let conn = state.db.lock().unwrap();
        match query.keyword.as_deref() {
            Some(keyword) => queries::get_rules_by_keyword(&conn, keyword)?,
            None => queries::get_all_rules(&conn)?,
        }
    };

    Ok(Json(rules.into_iter().map(RuleResponse::from).collect()))
}

#[derive(Deserialize)]
pub struct CreateRuleRequest {
    pub keywords: Vec<String>,
    pub response_template: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub fuzzy_match: bool,
    pub trigger_type: Option<String>,
    pub variables: Option<HashMap<String, serde_json::Value>>,
}

// POST /api/admin/rules
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateRuleRequest>,
) -> Result<(StatusCode, Json<RuleResponse>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let rule = KeywordRule::new(
        uuid::Uuid::new_v4().to_string(),
        payload.keywords,
        payload.response_template,
        payload.priority,
        payload.fuzzy_match,
        TriggerType::parse(payload.trigger_type.as_deref().unwrap_or("contains")),
        payload.variables,
        state.clock.now(),
    )?;

    {
        let conn = state.db.lock().unwrap();
        queries::save_rule(&conn, &rule)?;
    }

    tracing::info!(rule = %rule.id, "created keyword rule");
    Ok((StatusCode::CREATED, Json(RuleResponse::from(rule))))
}

// POST /api/admin/rules/:id/activate
pub async fn activate_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RuleResponse>, AppError> {
    set_rule_active(&state, &headers, &id, true)
}

// POST /api/admin/rules/:id/deactivate
pub async fn deactivate_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<RuleResponse>, AppError> {
    set_rule_active(&state, &headers, &id, false)
}

fn set_rule_active(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    id: &str,
    active: bool,
) -> Result<Json<RuleResponse>, AppError> {
    check_auth(headers, &state.config.admin_token)?;

    let conn = state.db.lock().unwrap();
    let mut rule = queries::get_rule(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("rule {id}")))?;

    if active {
        rule.activate();
    } else {
        rule.deactivate();
    }
    queries::save_rule(&conn, &rule)?;

    Ok(Json(RuleResponse::from(rule)))
}

// DELETE /api/admin/rules/:id
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let deleted = {
        let conn = state.db.lock().unwrap();
        queries::delete_rule(&conn, &id)?
    };

    if !deleted {
        return Err(AppError::NotFound(format!("rule {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
