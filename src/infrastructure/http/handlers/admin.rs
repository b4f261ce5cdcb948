//! Admin Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::CacheStatsResponse;
use crate::infrastructure::http::state::AppState;

/// 缓存统计
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStatsResponse> {
    let stats = state.cache.stats().await;
    Json(CacheStatsResponse {
        entries: stats.total_entries,
        total_size_bytes: stats.total_size_bytes,
        max_size_bytes: stats.max_size_bytes,
        hit_count: stats.hit_count,
        miss_count: stats.miss_count,
    })
}
