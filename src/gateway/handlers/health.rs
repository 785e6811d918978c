//! Health check handler

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
}

/// GET /health
///
/// - Healthy: 200 + {code: 0, data: {timestamp_ms}}
/// - Database unreachable: 503, without internal details
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    if let Err(e) = state.db.health_check().await {
        tracing::error!(error = %e, "[HEALTH] PostgreSQL ping failed");
        return ApiError::service_unavailable("unavailable").into_err();
    }
    ok(HealthResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
    })
}
