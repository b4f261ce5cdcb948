//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOCALIS_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOCALIS_SERVER__PORT=8080`
/// - `VOCALIS_ENGINE__PIPER_PATH=/usr/local/bin/piper`
/// - `VOCALIS_CACHE__MAX_SIZE_BYTES=1073741824`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default("engine.piper_path", "piper")?
        .set_default("engine.max_concurrent", 2)?
        .set_default("engine.synthesis_timeout_secs", 120)?
        .set_default("engine.smoke_test_timeout_secs", 30)?
        .set_default("converter.ffmpeg_path", "ffmpeg")?
        .set_default("converter.ffprobe_path", "ffprobe")?
        .set_default("converter.timeout_secs", 60)?
        .set_default("converter.probe_timeout_secs", 10)?
        .set_default("fetch.timeout_secs", 300)?
        .set_default("fetch.max_retries", 3)?
        .set_default("fetch.backoff_base_secs", 2)?
        .set_default("storage.voices_dir", "data/voices")?
        .set_default("storage.scratch_dir", "data/scratch")?
        .set_default("cache.dir", "data/cache")?
        .set_default("cache.max_size_bytes", 10_u64 * 1024 * 1024 * 1024)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: VOCALIS_
    // 层级分隔符: __ (双下划线)
    // 例如: VOCALIS_ENGINE__PIPER_PATH=/opt/piper/piper
    builder = builder.add_source(
        Environment::with_prefix("VOCALIS")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.engine.piper_path.is_empty() {
        return Err(ConfigError::ValidationError(
            "Piper path cannot be empty".to_string(),
        ));
    }

    if config.engine.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "Engine max_concurrent must be at least 1".to_string(),
        ));
    }

    if config.voices.is_empty() {
        return Err(ConfigError::ValidationError(
            "At least one voice must be configured".to_string(),
        ));
    }

    // 音色 ID 不允许重复（缓存 key 与磁盘路径都以 ID 为准）
    let mut seen = std::collections::HashSet::new();
    for voice in &config.voices {
        if voice.id.is_empty() {
            return Err(ConfigError::ValidationError(
                "Voice id cannot be empty".to_string(),
            ));
        }
        if !seen.insert(voice.id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Duplicate voice id: {}",
                voice.id
            )));
        }
        if voice.model_url.is_empty() || voice.config_url.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Voice {} must have model_url and config_url",
                voice.id
            )));
        }
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("Piper: {}", config.engine.piper_path);
    tracing::info!("Max Concurrent Processes: {}", config.engine.max_concurrent);
    tracing::info!("Synthesis Timeout: {}s", config.engine.synthesis_timeout_secs);
    tracing::info!("Voices Dir: {:?}", config.storage.voices_dir);
    tracing::info!("Cache Dir: {:?}", config.cache.dir);
    tracing::info!("Cache Max Size: {} bytes", config.cache.max_size_bytes);
    tracing::info!("Configured Voices: {}", config.voices.len());
    for voice in &config.voices {
        tracing::info!("  - {} ({}, engine={:?})", voice.id, voice.name, voice.engine);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
