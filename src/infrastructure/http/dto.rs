//! HTTP DTOs - 请求/响应结构

use serde::{Deserialize, Serialize};

/// 合成请求
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,

    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    /// 交付格式，接受 wav/ulaw/mp3 及 native/telephony/compressed
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_voice_id() -> String {
    "en_US-lessac-medium".to_string()
}

fn default_format() -> String {
    "wav".to_string()
}

/// 合成响应
#[derive(Debug, Serialize)]
pub struct SynthesizeResponse {
    pub success: bool,
    /// 音频下载地址（public_base_url + /audio/{file}）
    pub url: String,
    pub duration_secs: f64,
    pub request_id: String,
    pub cached: bool,
}

/// 单个音色信息
#[derive(Debug, Serialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    pub name: String,
    pub gender: Option<String>,
    pub quality: Option<String>,
    pub sample_rate: u32,
}

/// 音色列表响应
#[derive(Debug, Serialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub voices_available: usize,
    pub voices: Vec<String>,

    /// 初始化期间的 per-voice 警告；全部成功时不出现
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// 缓存统计响应
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}
