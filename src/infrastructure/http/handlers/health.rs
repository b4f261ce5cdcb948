//! Health Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::HealthResponse;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 健康检查
///
/// 零音色 Ready 视为未初始化，返回 503；
/// 部分失败仍算 healthy，但把警告带出来
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let ready = state.registry.list_ready();
    if ready.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "No voices ready".to_string(),
        ));
    }

    let warnings = state.registry.startup_warnings();
    Ok(Json(HealthResponse {
        status: "healthy",
        voices_available: ready.len(),
        voices: ready.iter().map(|v| v.id.to_string()).collect(),
        warnings: (!warnings.is_empty()).then_some(warnings),
    }))
}
