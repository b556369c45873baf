//! Control surface REST endpoints
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness plus call counts
//! - `GET /call/{call_id}` - Status of one tracked call
//! - `GET /calls` - Every tracked call, oldest first

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::core::session::{CallSnapshot, rfc3339};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Response for GET /health
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Calls that have not ended
    pub active_calls: usize,
    /// Every registry entry, including ended calls awaiting eviction
    pub tracked_calls: usize,
    pub timestamp: String,
}

/// Response for GET /calls
#[derive(Debug, Serialize)]
pub struct CallListResponse {
    pub count: usize,
    pub calls: Vec<CallSnapshot>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_calls: state.registry.active_count(),
        tracked_calls: state.registry.len(),
        timestamp: rfc3339(OffsetDateTime::now_utc()),
    })
}

pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> AppResult<Json<CallSnapshot>> {
    state
        .registry
        .get(&call_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Call not found".to_string()))
}

pub async fn list_calls(State(state): State<Arc<AppState>>) -> Json<CallListResponse> {
    let calls = state.registry.list();
    Json(CallListResponse {
        count: calls.len(),
        calls,
    })
}
