//! Voice Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::{VoiceInfo, VoicesResponse};
use crate::infrastructure::http::state::AppState;

/// 列出 Ready 音色
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<VoicesResponse> {
    let voices = state
        .registry
        .list_ready()
        .into_iter()
        .map(|v| VoiceInfo {
            voice_id: v.id.to_string(),
            name: v.display_name,
            gender: v.gender,
            quality: v.quality,
            sample_rate: v.sample_rate,
        })
        .collect();

    Json(VoicesResponse { voices })
}
