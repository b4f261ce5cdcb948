//! Audio Handler - 缓存音频文件下载

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::domain::voice::OutputFormat;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 下载缓存音频文件
///
/// 文件名限定在缓存目录内，拒绝任何带路径成分的请求
pub async fn serve_audio(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<Response, ApiError> {
    if !is_safe_file_name(&file_name) {
        return Err(ApiError::NotFound("Audio file not found".to_string()));
    }

    let path = state.audio_dir.join(&file_name);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::NotFound("Audio file not found".to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .len();

    let content_type = file_name
        .rsplit('.')
        .next()
        .and_then(OutputFormat::from_name)
        .map(|f| f.content_type())
        .unwrap_or("application/octet-stream");

    let stream = ReaderStream::new(file);
    Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size)
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// 纯文件名校验：无路径分隔符、无父目录引用、非隐藏文件
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}
