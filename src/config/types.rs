//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::voice::EngineKind;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 格式转换配置
    #[serde(default)]
    pub converter: ConverterConfig,

    /// 模型下载配置
    #[serde(default)]
    pub fetch: FetchConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 音频缓存配置
    #[serde(default)]
    pub cache: CacheConfig,

    /// API Key 配置
    #[serde(default)]
    pub auth: AuthConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,

    /// 音色模型配置表
    #[serde(default = "default_voices")]
    pub voices: Vec<VoiceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            converter: ConverterConfig::default(),
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            log: LogConfig::default(),
            voices: default_voices(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（用于拼接音频下载地址）
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            let host = if self.host == "0.0.0.0" {
                "localhost"
            } else {
                &self.host
            };
            format!("http://{}:{}", host, self.port)
        })
    }
}

/// 合成引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Piper 可执行文件路径
    #[serde(default = "default_piper_path")]
    pub piper_path: String,

    /// 最大并发外部进程数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// 请求合成超时（秒）
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// 冒烟测试合成超时（秒）
    #[serde(default = "default_smoke_test_timeout")]
    pub smoke_test_timeout_secs: u64,
}

fn default_piper_path() -> String {
    "piper".to_string()
}

fn default_max_concurrent() -> usize {
    2
}

fn default_synthesis_timeout() -> u64 {
    120
}

fn default_smoke_test_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            piper_path: default_piper_path(),
            max_concurrent: default_max_concurrent(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            smoke_test_timeout_secs: default_smoke_test_timeout(),
        }
    }
}

/// 格式转换配置
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    /// ffmpeg 可执行文件路径
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe 可执行文件路径
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// 转码超时（秒）
    #[serde(default = "default_convert_timeout")]
    pub timeout_secs: u64,

    /// 时长探测超时（秒）
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_convert_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    10
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_convert_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// 模型下载配置
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// 单次请求超时（秒）
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// 每个制品最大重试次数
    #[serde(default = "default_fetch_retries")]
    pub max_retries: u32,

    /// 重试退避基数（秒），第 n 次重试等待 n * backoff_base_secs
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
}

fn default_fetch_timeout() -> u64 {
    300
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_retries: default_fetch_retries(),
            backoff_base_secs: default_backoff_base(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 音色模型存储目录
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,

    /// 合成中间文件目录
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_voices_dir() -> PathBuf {
    PathBuf::from("data/voices")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("data/scratch")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            voices_dir: default_voices_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

/// 音频缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// 缓存目录
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// 缓存最大容量（字节），超出后按 LRU 淘汰
    #[serde(default = "default_cache_max_size")]
    pub max_size_bytes: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/cache")
}

fn default_cache_max_size() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GB
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_size_bytes: default_cache_max_size(),
        }
    }
}

/// API Key 配置
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// 有效 API Key 列表
    #[serde(default = "default_api_keys")]
    pub api_keys: Vec<String>,
}

fn default_api_keys() -> Vec<String> {
    vec![
        "demo-key".to_string(),
        "test-key".to_string(),
        "dev-key".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_keys: default_api_keys(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// 单个音色模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// 音色 ID（稳定字符串 key）
    pub id: String,

    /// 展示名称
    pub name: String,

    /// 性别标签
    #[serde(default)]
    pub gender: Option<String>,

    /// 质量标签
    #[serde(default)]
    pub quality: Option<String>,

    /// 采样率（Hz）；Piper 音色以模型配置解析结果为准，
    /// placeholder 音色没有模型配置，以此字段为准
    #[serde(default)]
    pub sample_rate: Option<u32>,

    /// 模型制品 URL
    pub model_url: String,

    /// 模型配置制品 URL
    pub config_url: String,

    /// 后端引擎类型
    #[serde(default)]
    pub engine: EngineKind,

    /// 模型制品期望字节数（用于下载完整性校验）
    #[serde(default)]
    pub expected_model_bytes: Option<u64>,

    /// 模型制品 SHA-256（十六进制，可选校验）
    #[serde(default)]
    pub model_sha256: Option<String>,
}

/// 默认音色表（Piper 高质量英文模型）
fn default_voices() -> Vec<VoiceConfig> {
    const HF_BASE: &str = "https://huggingface.co/rhasspy/piper-voices/resolve/v1.0.0/en/en_US";

    vec![
        VoiceConfig {
            id: "en_US-lessac-medium".to_string(),
            name: "Female Voice (Natural)".to_string(),
            gender: Some("female".to_string()),
            quality: Some("medium".to_string()),
            sample_rate: Some(22050),
            model_url: format!("{}/lessac/medium/en_US-lessac-medium.onnx", HF_BASE),
            config_url: format!("{}/lessac/medium/en_US-lessac-medium.onnx.json", HF_BASE),
            engine: EngineKind::Piper,
            expected_model_bytes: None,
            model_sha256: None,
        },
        VoiceConfig {
            id: "en_US-ryan-high".to_string(),
            name: "Male Voice (High Quality)".to_string(),
            gender: Some("male".to_string()),
            quality: Some("high".to_string()),
            sample_rate: Some(22050),
            model_url: format!("{}/ryan/high/en_US-ryan-high.onnx", HF_BASE),
            config_url: format!("{}/ryan/high/en_US-ryan-high.onnx.json", HF_BASE),
            engine: EngineKind::Piper,
            expected_model_bytes: None,
            model_sha256: None,
        },
    ]
}
