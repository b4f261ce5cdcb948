//! Application State

use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::AudioCachePort;
use crate::application::{SynthesisCoordinator, VoiceRegistry};

/// 应用状态
///
/// 所有处理器共享；服务启动前由 main 完成装配
pub struct AppState {
    pub coordinator: Arc<SynthesisCoordinator>,
    pub registry: Arc<VoiceRegistry>,
    pub cache: Arc<dyn AudioCachePort>,
    /// 有效 API key 列表
    pub api_keys: Vec<String>,
    /// 拼接音频下载地址用的对外 Base URL
    pub public_base_url: String,
    /// /audio/{file} 的文件根目录（缓存目录）
    pub audio_dir: PathBuf,
}
