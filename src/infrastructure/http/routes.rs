//! HTTP Routes
//!
//! API Endpoints:
//! - /health               GET   健康检查（503 直到有音色 Ready）
//! - /api/voices           GET   Ready 音色列表
//! - /api/synthesize       POST  合成语音（API key）
//! - /api/cache/stats      GET   缓存统计（API key）
//! - /audio/{file_name}    GET   下载缓存音频

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::middleware::require_api_key;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/audio/:file_name", get(handlers::serve_audio))
        .nest("/api", api_routes(state))
}

/// API 路由；合成与缓存统计需要 API key
fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/synthesize", post(handlers::synthesize))
        .route("/cache/stats", get(handlers::cache_stats))
        .layer(middleware::from_fn_with_state(state, require_api_key));

    Router::new()
        .route("/voices", get(handlers::list_voices))
        .merge(protected)
}
