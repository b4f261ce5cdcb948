//! Vocalis - 语音合成服务
//!
//! 启动流程：加载配置 → 初始化日志 → 装配适配器 →
//! 音色初始化（零 Ready 即退出）→ 启动 HTTP 服务

use std::sync::Arc;

use vocalis::application::ports::{AudioCachePort, SynthesisBackendPort};
use vocalis::application::{BackendSet, SynthesisCoordinator, VoiceRegistry};
use vocalis::config::{load_config, print_config};
use vocalis::infrastructure::adapters::backend::{PiperBackend, PlaceholderBackend};
use vocalis::infrastructure::adapters::cache::FileAudioCache;
use vocalis::infrastructure::adapters::converter::FfmpegConverter;
use vocalis::infrastructure::adapters::fetcher::HttpModelFetcher;
use vocalis::infrastructure::http::{AppState, HttpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},vocalis={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Vocalis - 语音合成服务");
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.voices_dir).await?;
    tokio::fs::create_dir_all(&config.storage.scratch_dir).await?;

    // 装配出站适配器
    let fetcher = Arc::new(
        HttpModelFetcher::new(&config.fetch)
            .map_err(|e| anyhow::anyhow!("Failed to create fetcher: {}", e))?,
    );
    let piper: Arc<dyn SynthesisBackendPort> =
        Arc::new(PiperBackend::new(&config.engine.piper_path));
    let placeholder: Arc<dyn SynthesisBackendPort> = Arc::new(PlaceholderBackend::new());
    let backends = BackendSet::new(piper, placeholder);
    let converter = Arc::new(FfmpegConverter::new(&config.converter));
    let cache: Arc<dyn AudioCachePort> = Arc::new(
        FileAudioCache::open(&config.cache)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open audio cache: {}", e))?,
    );

    // 音色初始化：并发获取与验证，零 Ready 视为启动失败
    let registry = Arc::new(VoiceRegistry::new(
        config.voices.clone(),
        fetcher,
        backends.clone(),
        config.fetch.clone(),
        &config.engine,
        &config.storage,
    ));
    match registry.initialize().await {
        Ok(ready) => tracing::info!(ready, "Voice initialization complete"),
        Err(e) => {
            tracing::error!(error = %e, "Voice initialization failed");
            anyhow::bail!("no voices available: {}", e);
        }
    }

    let coordinator = Arc::new(SynthesisCoordinator::new(
        registry.clone(),
        backends,
        converter,
        cache.clone(),
        &config.engine,
        &config.storage,
    ));

    // 启动 HTTP 服务
    let state = Arc::new(AppState {
        coordinator,
        registry,
        cache,
        api_keys: config.auth.api_keys.clone(),
        public_base_url: config.server.public_base_url(),
        audio_dir: config.cache.dir.clone(),
    });

    let server = HttpServer::new(config.server.addr(), state);
    server
        .run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
