//! Synthesize Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{SynthesizeRequest, SynthesizeResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 合成语音
///
/// 返回缓存文件的下载地址；命中与新合成对调用方无区别
pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Json<SynthesizeResponse>, ApiError> {
    let result = state
        .coordinator
        .synthesize(&request.text, &request.voice_id, &request.format)
        .await?;

    let file_name = result
        .file_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ApiError::Internal("cache file has no valid name".to_string()))?;

    Ok(Json(SynthesizeResponse {
        success: true,
        url: format!("{}/audio/{}", state.public_base_url, file_name),
        duration_secs: result.duration_secs,
        request_id: result.request_id,
        cached: result.cache_hit,
    }))
}
