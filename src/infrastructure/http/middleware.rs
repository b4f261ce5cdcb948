//! HTTP Middleware
//!
//! API key 校验与 HTTP 状态码错误日志

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;

/// API key 校验中间件
///
/// 从 X-API-Key 头读取，不在配置的有效列表内直接 401
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if state.api_keys.iter().any(|k| k == key) => next.run(request).await,
        _ => {
            tracing::warn!(uri = %request.uri(), "Rejected request with invalid API key");
            ApiError::Unauthorized.into_response()
        }
    }
}

/// HTTP 状态码错误日志中间件
///
/// 拦截响应，4xx 记 warning，5xx 记 error
pub async fn error_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            "HTTP client error"
        );
    }

    response
}
