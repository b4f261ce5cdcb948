//! Voice Registry - 音色生命周期编排
//!
//! 每个音色独立走 fetch → verify → validate 流水线：
//! 音色之间并发、互不阻塞；单个音色内部各步骤严格串行。
//! 只有零音色 Ready 时整体初始化才算失败。

use dashmap::DashMap;
use futures_util::future::join_all;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::application::error::InitError;
use crate::application::ports::{FetchError, ModelFetcherPort};
use crate::application::services::BackendSet;
use crate::config::{EngineConfig, FetchConfig, StorageConfig, VoiceConfig};
use crate::domain::voice::{EngineKind, LifecycleState, VoiceId, VoiceModel};

/// 模型制品最小合法字节数（截断下载 / 被存成模型的 HTML 错误页会小于此值）
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// 配置制品最小合法字节数
const MIN_CONFIG_BYTES: u64 = 100;

/// 冒烟测试输出最小合法字节数
const MIN_SMOKE_OUTPUT_BYTES: u64 = 1000;

/// 冒烟测试固定文本，输出仅用于验证、随后丢弃
const SMOKE_TEST_TEXT: &str = "Hello, this is a voice test.";

/// Ready 音色的展示信息
#[derive(Debug, Clone)]
pub struct VoiceSummary {
    pub id: VoiceId,
    pub display_name: String,
    pub gender: Option<String>,
    pub quality: Option<String>,
    pub sample_rate: u32,
}

/// 音色注册表
///
/// 初始化期间是音色状态的唯一写者；Ready 之后合成任务并发只读。
/// 模型文件在进入 Ready 之前绝不会被读取，生命周期门闸即是
/// 模型访问所需的全部并发控制。
pub struct VoiceRegistry {
    voices: DashMap<VoiceId, VoiceModel>,
    configs: Vec<VoiceConfig>,
    fetcher: Arc<dyn ModelFetcherPort>,
    backends: BackendSet,
    fetch_cfg: FetchConfig,
    smoke_test_timeout: Duration,
    voices_dir: PathBuf,
    scratch_dir: PathBuf,
    warnings: std::sync::Mutex<Vec<String>>,
}

impl VoiceRegistry {
    pub fn new(
        voice_configs: Vec<VoiceConfig>,
        fetcher: Arc<dyn ModelFetcherPort>,
        backends: BackendSet,
        fetch_cfg: FetchConfig,
        engine_cfg: &EngineConfig,
        storage: &StorageConfig,
    ) -> Self {
        let voices = DashMap::new();
        for cfg in &voice_configs {
            let voice = VoiceModel::new(
                VoiceId::new(&cfg.id),
                &cfg.name,
                cfg.gender.clone(),
                cfg.quality.clone(),
                &cfg.model_url,
                &cfg.config_url,
                cfg.engine,
            );
            voices.insert(voice.id().clone(), voice);
        }

        Self {
            voices,
            configs: voice_configs,
            fetcher,
            backends,
            fetch_cfg,
            smoke_test_timeout: Duration::from_secs(engine_cfg.smoke_test_timeout_secs),
            voices_dir: storage.voices_dir.clone(),
            scratch_dir: storage.scratch_dir.clone(),
            warnings: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// 初始化所有配置的音色，返回 Ready 的数量
    ///
    /// 单个音色失败记为 warning，不影响其他音色；
    /// 只有零音色 Ready 才返回 InitError
    pub async fn initialize(&self) -> Result<usize, InitError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await.ok();

        let configs = self.configs.clone();
        let results = join_all(configs.iter().map(|cfg| self.init_voice(cfg))).await;

        let mut ready = 0usize;
        for (cfg, result) in configs.iter().zip(results) {
            match result {
                Ok(()) => {
                    ready += 1;
                    tracing::info!(voice_id = %cfg.id, "Voice validated");
                }
                Err(reason) => {
                    tracing::warn!(voice_id = %cfg.id, reason = %reason, "Voice unavailable");
                    self.push_warning(format!("{}: {}", cfg.id, reason));
                }
            }
        }

        let warnings = self.startup_warnings();
        if ready == 0 {
            return Err(InitError::NoVoicesReady { warnings });
        }

        if !warnings.is_empty() {
            tracing::warn!(
                ready,
                failed = warnings.len(),
                "Initialization completed with warnings"
            );
        } else {
            tracing::info!(ready, "All voices ready");
        }

        Ok(ready)
    }

    /// 单个音色的完整生命周期：fetch → verify → validate
    async fn init_voice(&self, cfg: &VoiceConfig) -> Result<(), String> {
        let voice_id = VoiceId::new(&cfg.id);
        let voice_dir = self.voices_dir.join(&cfg.id);
        let model_path = voice_dir.join(format!("{}.model", cfg.id));
        let config_path = voice_dir.join(format!("{}.config", cfg.id));

        self.with_voice(&voice_id, |v| v.begin_fetch())?;

        // Placeholder 引擎无真实制品，直接进入冒烟测试
        if cfg.engine == EngineKind::Placeholder {
            self.with_voice(&voice_id, |v| {
                v.begin_validation(model_path.clone(), config_path.clone())
            })?;
            return self.validate_voice(cfg, &voice_id, &model_path, &config_path).await;
        }

        if let Err(e) = tokio::fs::create_dir_all(&voice_dir).await {
            self.with_voice(&voice_id, |v| v.mark_fetch_failed())?;
            return Err(format!("cannot create voice dir: {}", e));
        }

        // 获取两个制品；任一制品重试耗尽即 FetchFailed
        let fetched = self
            .fetch_artifacts(cfg, &model_path, &config_path)
            .await;
        if let Err(reason) = fetched {
            self.with_voice(&voice_id, |v| v.mark_fetch_failed())?;
            return Err(reason);
        }

        // 尺寸门槛：截断下载或被存成模型的 HTML 错误页在这里被拦下
        let model_size = file_size(&model_path).await;
        let config_size = file_size(&config_path).await;
        if model_size < MIN_MODEL_BYTES {
            self.with_voice(&voice_id, |v| v.mark_fetch_failed())?;
            return Err(format!(
                "model file too small: {} bytes (minimum {})",
                model_size, MIN_MODEL_BYTES
            ));
        }
        if config_size < MIN_CONFIG_BYTES {
            self.with_voice(&voice_id, |v| v.mark_fetch_failed())?;
            return Err(format!(
                "config file too small: {} bytes (minimum {})",
                config_size, MIN_CONFIG_BYTES
            ));
        }

        // 可选完整性校验（配置提供时）
        if let Err(e) = self.verify_integrity(cfg, &model_path, model_size).await {
            self.with_voice(&voice_id, |v| v.mark_fetch_failed())?;
            return Err(format!("model integrity check failed: {}", e));
        }

        self.with_voice(&voice_id, |v| {
            v.begin_validation(model_path.clone(), config_path.clone())
        })?;

        self.validate_voice(cfg, &voice_id, &model_path, &config_path).await
    }

    /// 下载模型与配置制品，模型重试 + 线性退避
    async fn fetch_artifacts(
        &self,
        cfg: &VoiceConfig,
        model_path: &Path,
        config_path: &Path,
    ) -> Result<(), String> {
        // 已完整的模型跳过下载（仅大小检查，幂等）
        let existing = file_size(model_path).await;
        let complete = existing >= MIN_MODEL_BYTES
            && cfg
                .expected_model_bytes
                .map(|expected| existing == expected)
                .unwrap_or(true);

        if complete {
            tracing::debug!(voice_id = %cfg.id, bytes = existing, "Model already present, skipping fetch");
        } else {
            self.fetch_with_retry(&cfg.model_url, model_path)
                .await
                .map_err(|e| format!("model fetch failed: {}", e))?;
        }

        if file_size(config_path).await < MIN_CONFIG_BYTES {
            self.fetch_with_retry(&cfg.config_url, config_path)
                .await
                .map_err(|e| format!("config fetch failed: {}", e))?;
        }

        Ok(())
    }

    /// 最多 max_retries 次重试，退避 2s/4s/6s 线性递增
    async fn fetch_with_retry(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let max_retries = self.fetch_cfg.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.fetcher.fetch(url, dest).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    let wait = Duration::from_secs(attempt as u64 * self.fetch_cfg.backoff_base_secs);
                    tracing::warn!(
                        url,
                        attempt,
                        wait_secs = wait.as_secs(),
                        error = %e,
                        "Fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 校验下载制品的期望大小 / SHA-256（配置提供时）
    async fn verify_integrity(
        &self,
        cfg: &VoiceConfig,
        model_path: &Path,
        model_size: u64,
    ) -> Result<(), FetchError> {
        if let Some(expected) = cfg.expected_model_bytes {
            if model_size != expected {
                return Err(FetchError::SizeMismatch {
                    expected,
                    actual: model_size,
                });
            }
        }

        if let Some(expected) = &cfg.model_sha256 {
            let data = tokio::fs::read(model_path).await?;
            let actual = format!("{:x}", Sha256::digest(&data));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Validating → {ValidationFailed | Ready}
    ///
    /// 配置解析 + 冒烟测试合成；冒烟输出仅验证、不进缓存
    async fn validate_voice(
        &self,
        cfg: &VoiceConfig,
        voice_id: &VoiceId,
        model_path: &Path,
        config_path: &Path,
    ) -> Result<(), String> {
        let result = self
            .run_validation(cfg, voice_id, model_path, config_path)
            .await;

        match result {
            Ok(sample_rate) => {
                self.with_voice(voice_id, |v| v.mark_ready(sample_rate))?;
                Ok(())
            }
            Err(reason) => {
                self.with_voice(voice_id, |v| v.mark_validation_failed())?;
                Err(reason)
            }
        }
    }

    async fn run_validation(
        &self,
        cfg: &VoiceConfig,
        voice_id: &VoiceId,
        model_path: &Path,
        config_path: &Path,
    ) -> Result<u32, String> {
        // Placeholder 引擎没有模型配置，可用采样率来自音色配置
        let sample_rate = if cfg.engine == EngineKind::Placeholder {
            cfg.sample_rate.unwrap_or(22050)
        } else {
            parse_sample_rate(config_path).await?
        };

        // 冒烟测试：固定文本合成 + 输出体检
        let smoke_path = self.scratch_dir.join(format!("validate_{}.wav", cfg.id));
        let backend = self.backends.for_engine(cfg.engine);

        let synth_result = backend
            .synthesize(
                SMOKE_TEST_TEXT,
                model_path,
                config_path,
                &smoke_path,
                self.smoke_test_timeout,
            )
            .await;

        let check = match synth_result {
            Ok(()) => check_smoke_output(&smoke_path).await,
            Err(e) => Err(format!("smoke test synthesis failed: {}", e)),
        };

        // 无论成败都丢弃冒烟输出
        tokio::fs::remove_file(&smoke_path).await.ok();

        check?;
        tracing::debug!(voice_id = %voice_id, sample_rate, "Smoke test passed");
        Ok(sample_rate)
    }

    /// Ready 音色的模型路径；未 Ready 返回 None
    pub fn model_paths(&self, voice_id: &VoiceId) -> Option<(PathBuf, PathBuf)> {
        let voice = self.voices.get(voice_id)?;
        if !voice.is_ready() {
            return None;
        }
        Some((
            voice.local_model_path()?.clone(),
            voice.local_config_path()?.clone(),
        ))
    }

    /// Ready 音色的引擎类型
    pub fn engine_kind(&self, voice_id: &VoiceId) -> Option<EngineKind> {
        let voice = self.voices.get(voice_id)?;
        voice.is_ready().then(|| voice.engine())
    }

    pub fn is_ready(&self, voice_id: &VoiceId) -> bool {
        self.voices
            .get(voice_id)
            .map(|v| v.is_ready())
            .unwrap_or(false)
    }

    /// Ready 音色列表（按配置顺序）
    pub fn list_ready(&self) -> Vec<VoiceSummary> {
        self.configs
            .iter()
            .filter_map(|cfg| {
                let voice = self.voices.get(&VoiceId::new(&cfg.id))?;
                if !voice.is_ready() {
                    return None;
                }
                Some(VoiceSummary {
                    id: voice.id().clone(),
                    display_name: voice.display_name().to_string(),
                    gender: voice.gender().map(String::from),
                    quality: voice.quality().map(String::from),
                    sample_rate: voice.sample_rate().unwrap_or(0),
                })
            })
            .collect()
    }

    pub fn lifecycle_state(&self, voice_id: &VoiceId) -> Option<LifecycleState> {
        self.voices.get(voice_id).map(|v| v.lifecycle_state())
    }

    /// 初始化期间累积的 per-voice 警告
    pub fn startup_warnings(&self) -> Vec<String> {
        self.warnings.lock().expect("warnings lock poisoned").clone()
    }

    fn push_warning(&self, warning: String) {
        self.warnings
            .lock()
            .expect("warnings lock poisoned")
            .push(warning);
    }

    /// 短临界区内修改音色状态；状态机拒绝的迁移转为错误文本
    fn with_voice(
        &self,
        voice_id: &VoiceId,
        f: impl FnOnce(&mut VoiceModel) -> Result<(), crate::domain::voice::VoiceError>,
    ) -> Result<(), String> {
        let mut voice = self
            .voices
            .get_mut(voice_id)
            .ok_or_else(|| format!("voice not registered: {}", voice_id))?;
        f(&mut voice).map_err(|e| e.to_string())
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
}

/// 解析模型配置 JSON 中的 audio.sample_rate
async fn parse_sample_rate(config_path: &Path) -> Result<u32, String> {
    let raw = tokio::fs::read(config_path)
        .await
        .map_err(|e| format!("cannot read config: {}", e))?;

    let parsed: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|e| format!("config JSON parsing failed: {}", e))?;

    let sample_rate = parsed
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|s| s.as_u64())
        .ok_or_else(|| "invalid config structure: missing audio.sample_rate".to_string())?;

    if sample_rate == 0 || sample_rate > u32::MAX as u64 {
        return Err(format!("invalid sample rate: {}", sample_rate));
    }

    Ok(sample_rate as u32)
}

/// 冒烟测试输出体检：存在、大小、WAV 容器头
async fn check_smoke_output(path: &Path) -> Result<(), String> {
    let size = file_size(path).await;
    if size == 0 {
        return Err("smoke test produced no output file".to_string());
    }
    if size < MIN_SMOKE_OUTPUT_BYTES {
        return Err(format!("smoke test output too small: {} bytes", size));
    }

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read smoke test output: {}", e))?;
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err("smoke test output is not a valid WAV file".to_string());
    }

    Ok(())
}
