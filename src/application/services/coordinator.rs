//! Synthesis Coordinator - 请求编排
//!
//! 单个合成请求的端到端流水线：
//! 校验 → 缓存查找 → 合成 → 转码 → 入缓存。
//! 相同 key 的并发请求单飞（single-flight）合并，
//! 外部引擎进程数由信号量限制。

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use uuid::Uuid;

use crate::application::error::RequestError;
use crate::application::ports::{generate_cache_key, AudioCachePort, FormatConverterPort};
use crate::application::services::{BackendSet, VoiceRegistry};
use crate::config::{EngineConfig, StorageConfig};
use crate::domain::voice::{OutputFormat, VoiceId};

/// 请求文本最大字符数
const MAX_TEXT_CHARS: usize = 5000;

/// 单飞广播的载荷：成功为 (缓存文件路径, 时长)
type FlightResult = Result<(PathBuf, f64), String>;

/// 合成结果
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    pub request_id: String,
    pub cache_hit: bool,
}

/// 合成协调器
///
/// 请求校验顺序固定：空文本 → 超长 → 音色 → 格式，
/// 全部通过之后才会触碰缓存或任何子进程
pub struct SynthesisCoordinator {
    registry: Arc<VoiceRegistry>,
    backends: BackendSet,
    converter: Arc<dyn FormatConverterPort>,
    cache: Arc<dyn AudioCachePort>,
    /// 外部引擎进程并发上限
    engine_slots: Arc<Semaphore>,
    /// key → 进行中请求的广播端；leader 完成后移除再广播
    inflight: DashMap<String, broadcast::Sender<FlightResult>>,
    scratch_dir: PathBuf,
    synthesis_timeout: Duration,
}

impl SynthesisCoordinator {
    pub fn new(
        registry: Arc<VoiceRegistry>,
        backends: BackendSet,
        converter: Arc<dyn FormatConverterPort>,
        cache: Arc<dyn AudioCachePort>,
        engine_cfg: &EngineConfig,
        storage: &StorageConfig,
    ) -> Self {
        Self {
            registry,
            backends,
            converter,
            cache,
            engine_slots: Arc::new(Semaphore::new(engine_cfg.max_concurrent.max(1))),
            inflight: DashMap::new(),
            scratch_dir: storage.scratch_dir.clone(),
            synthesis_timeout: Duration::from_secs(engine_cfg.synthesis_timeout_secs),
        }
    }

    /// 端到端处理一个合成请求
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        format_name: &str,
    ) -> Result<SynthesisResult, RequestError> {
        let request_id = Uuid::new_v4().to_string()[..8].to_string();

        // 请求校验，顺序固定
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RequestError::EmptyText);
        }
        if trimmed.chars().count() > MAX_TEXT_CHARS {
            return Err(RequestError::TextTooLong {
                max: MAX_TEXT_CHARS,
            });
        }

        let vid = VoiceId::new(voice_id);
        if !self.registry.is_ready(&vid) {
            let available = self
                .registry
                .list_ready()
                .iter()
                .map(|v| v.id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RequestError::UnknownVoice {
                voice_id: voice_id.to_string(),
                available,
            });
        }

        let format = OutputFormat::from_name(format_name).ok_or_else(|| {
            RequestError::UnsupportedFormat {
                requested: format_name.to_string(),
                supported: "wav, ulaw, mp3",
            }
        })?;

        let key = generate_cache_key(trimmed, &vid, format);

        // 缓存命中直接返回，不占用引擎槽位
        if let Some(entry) = self.cache.lookup(&key).await {
            tracing::info!(
                %request_id,
                voice_id,
                %format,
                key = %&key[..12],
                "Cache hit"
            );
            return Ok(SynthesisResult {
                file_path: entry.file_path,
                duration_secs: entry.duration_secs,
                request_id,
                cache_hit: true,
            });
        }

        tracing::info!(
            %request_id,
            voice_id,
            %format,
            chars = trimmed.chars().count(),
            "Cache miss, synthesizing"
        );

        // 单飞合并：相同 key 的并发 miss 只触发一次合成
        let leader = match self.inflight.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let mut rx = occupied.get().subscribe();
                drop(occupied);
                tracing::debug!(%request_id, key = %&key[..12], "Joining in-flight synthesis");
                match rx.recv().await {
                    Ok(Ok((file_path, duration_secs))) => {
                        return Ok(SynthesisResult {
                            file_path,
                            duration_secs,
                            request_id,
                            cache_hit: false,
                        });
                    }
                    Ok(Err(msg)) => return Err(RequestError::Internal(msg)),
                    // leader 异常退出没有广播，退化为自己合成
                    Err(_) => None,
                }
            }
            Entry::Vacant(vacant) => {
                let (tx, _) = broadcast::channel(1);
                vacant.insert(tx.clone());
                // 守卫保证条目在 leader 退出时移除，包括请求中途被取消的情况
                let guard = InflightGuard {
                    map: &self.inflight,
                    key: key.clone(),
                };
                Some((tx, guard))
            }
        };

        let result = self
            .perform_synthesis(trimmed, &vid, format, &key, &request_id)
            .await;

        if let Some((tx, guard)) = leader {
            // 先移除条目再广播：新请求要么看到缓存，要么开新的一轮
            drop(guard);
            let _ = tx.send(match &result {
                Ok(r) => Ok((r.file_path.clone(), r.duration_secs)),
                Err(e) => Err(e.to_string()),
            });
        }

        result
    }

    /// 合成 → 转码 → 入缓存（校验与缓存查找已经通过）
    async fn perform_synthesis(
        &self,
        text: &str,
        voice_id: &VoiceId,
        format: OutputFormat,
        key: &str,
        request_id: &str,
    ) -> Result<SynthesisResult, RequestError> {
        let (model_path, config_path) = self
            .registry
            .model_paths(voice_id)
            .ok_or_else(|| RequestError::Internal(format!("voice '{}' lost readiness", voice_id)))?;
        let engine = self
            .registry
            .engine_kind(voice_id)
            .ok_or_else(|| RequestError::Internal(format!("voice '{}' lost readiness", voice_id)))?;

        let raw_path = self.scratch_dir.join(format!("{}_raw.wav", request_id));
        let final_path = self
            .scratch_dir
            .join(format!("{}.{}", request_id, format.extension()));

        // 中间文件在离开作用域时清理，无论成败
        let _raw_guard = TempGuard::new(raw_path.clone());
        let _final_guard = TempGuard::new(final_path.clone());

        // 引擎槽位限流只覆盖子进程阶段
        let _permit = self
            .engine_slots
            .acquire()
            .await
            .map_err(|_| RequestError::Internal("engine slots closed".to_string()))?;

        let backend = self.backends.for_engine(engine);
        backend
            .synthesize(
                text,
                &model_path,
                &config_path,
                &raw_path,
                self.synthesis_timeout,
            )
            .await?;

        self.converter.convert(&raw_path, format, &final_path).await?;
        let duration_secs = self.converter.duration_secs(&final_path).await;

        let entry = self
            .cache
            .store(key, &final_path, format, duration_secs)
            .await?;

        tracing::info!(
            request_id,
            voice_id = %voice_id,
            bytes = entry.byte_size,
            duration_secs,
            "Synthesis complete"
        );

        Ok(SynthesisResult {
            file_path: entry.file_path,
            duration_secs,
            request_id: request_id.to_string(),
            cache_hit: false,
        })
    }
}

/// 单飞条目守卫：leader 离开（含被取消）时把 in-flight 条目摘掉，
/// 否则这个 key 的后续请求会一直订阅一个没人广播的频道
struct InflightGuard<'a> {
    map: &'a DashMap<String, broadcast::Sender<FlightResult>>,
    key: String,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

/// 中间文件守卫，Drop 时删除
struct TempGuard {
    path: PathBuf,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        // 文件可能已被改名移走，删除失败不是错误
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::tempdir;

    use crate::application::ports::{
        CacheEntry, CacheError, CacheStats, FetchError, ModelFetcherPort, SynthesisBackendPort,
        SynthesisError,
    };
    use crate::config::{FetchConfig, VoiceConfig};
    use crate::domain::voice::EngineKind;

    struct StubFetcher;

    #[async_trait]
    impl ModelFetcherPort for StubFetcher {
        async fn fetch(&self, source_url: &str, dest: &Path) -> Result<u64, FetchError> {
            // 配置必须越过 100 字节的大小门槛
            let data = if source_url.ends_with(".config.json") {
                br#"{"audio": {"sample_rate": 22050, "quality": "medium"}, "num_symbols": 256, "num_speakers": 1, "phoneme_type": "espeak", "language": {"code": "en_US"}}"#
                    .to_vec()
            } else {
                vec![0u8; 1_000_100]
            };
            tokio::fs::write(dest, &data).await?;
            Ok(data.len() as u64)
        }
    }

    struct CountingBackend {
        calls: AtomicU32,
        delay: Duration,
    }

    #[async_trait]
    impl SynthesisBackendPort for CountingBackend {
        async fn synthesize(
            &self,
            _text: &str,
            _model_path: &Path,
            _config_path: &Path,
            output_path: &Path,
            _timeout: Duration,
        ) -> Result<(), SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut wav = Vec::new();
            wav.extend_from_slice(b"RIFF");
            wav.extend_from_slice(&2036u32.to_le_bytes());
            wav.extend_from_slice(b"WAVE");
            wav.resize(2044, 0);
            tokio::fs::write(output_path, &wav).await?;
            Ok(())
        }
    }

    /// pass-through 转换器：改名到目标路径，固定时长
    struct StubConverter;

    #[async_trait]
    impl FormatConverterPort for StubConverter {
        async fn convert(
            &self,
            raw_wav: &Path,
            _format: OutputFormat,
            final_path: &Path,
        ) -> Result<(), crate::application::ports::ConversionError> {
            tokio::fs::rename(raw_wav, final_path).await?;
            Ok(())
        }

        async fn duration_secs(&self, _path: &Path) -> f64 {
            1.5
        }
    }

    /// 内存索引 + 目录文件的最小缓存实现
    struct StubCache {
        dir: PathBuf,
        entries: DashMap<String, CacheEntry>,
    }

    #[async_trait]
    impl AudioCachePort for StubCache {
        async fn lookup(&self, key: &str) -> Option<CacheEntry> {
            self.entries.get(key).map(|e| e.clone())
        }

        async fn store(
            &self,
            key: &str,
            source: &Path,
            format: OutputFormat,
            duration_secs: f64,
        ) -> Result<CacheEntry, CacheError> {
            let dest = self.dir.join(format!("{}.{}", key, format.extension()));
            tokio::fs::copy(source, &dest).await?;
            let byte_size = tokio::fs::metadata(&dest).await?.len();
            let entry = CacheEntry {
                key: key.to_string(),
                file_path: dest,
                byte_size,
                duration_secs,
                created_at: chrono::Utc::now(),
            };
            self.entries.insert(key.to_string(), entry.clone());
            Ok(entry)
        }

        async fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    struct Harness {
        coordinator: Arc<SynthesisCoordinator>,
        backend: Arc<CountingBackend>,
        scratch_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        harness_with_delay(Duration::ZERO).await
    }

    /// 后端带人工延迟的变体，给并发/取消场景留出竞争窗口
    async fn harness_with_delay(delay: Duration) -> Harness {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            voices_dir: dir.path().join("voices"),
            scratch_dir: dir.path().join("scratch"),
        };
        let engine_cfg = EngineConfig::default();

        let voice = VoiceConfig {
            id: "en_US-test-medium".to_string(),
            name: "Test".to_string(),
            gender: None,
            quality: None,
            sample_rate: None,
            model_url: "http://models.test/v.onnx".to_string(),
            config_url: "http://models.test/v.config.json".to_string(),
            engine: EngineKind::Piper,
            expected_model_bytes: None,
            model_sha256: None,
        };

        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
            delay,
        });
        let backends = BackendSet::new(backend.clone(), backend.clone());

        let registry = Arc::new(VoiceRegistry::new(
            vec![voice],
            Arc::new(StubFetcher),
            backends.clone(),
            FetchConfig {
                timeout_secs: 1,
                max_retries: 0,
                backoff_base_secs: 0,
            },
            &engine_cfg,
            &storage,
        ));
        registry.initialize().await.unwrap();
        // 冒烟测试也经过后端，计数清零
        backend.calls.store(0, Ordering::SeqCst);

        let cache_dir = dir.path().join("cache");
        tokio::fs::create_dir_all(&cache_dir).await.unwrap();
        let cache = Arc::new(StubCache {
            dir: cache_dir,
            entries: DashMap::new(),
        });

        let scratch_dir = storage.scratch_dir.clone();
        let coordinator = Arc::new(SynthesisCoordinator::new(
            registry,
            backends,
            Arc::new(StubConverter),
            cache,
            &engine_cfg,
            &storage,
        ));

        Harness {
            coordinator,
            backend,
            scratch_dir,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_repeat_request_hits_cache() {
        let h = harness().await;

        let first = h
            .coordinator
            .synthesize("Hello world", "en_US-test-medium", "wav")
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);

        let second = h
            .coordinator
            .synthesize("Hello world", "en_US-test-medium", "wav")
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.file_path, first.file_path);
        // 后端没有被再次调用
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_backend_call() {
        let h = harness().await;

        let err = h
            .coordinator
            .synthesize("   ", "en_US-test-medium", "wav")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::EmptyText));

        let long_text = "a".repeat(MAX_TEXT_CHARS + 1);
        let err = h
            .coordinator
            .synthesize(&long_text, "en_US-test-medium", "wav")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::TextTooLong { max: 5000 }));

        let err = h
            .coordinator
            .synthesize("Hello", "no-such-voice", "wav")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::UnknownVoice { .. }));

        let err = h
            .coordinator
            .synthesize("Hello", "en_US-test-medium", "flac")
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::UnsupportedFormat { .. }));

        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_voice_lists_available() {
        let h = harness().await;
        let err = h
            .coordinator
            .synthesize("Hello", "bogus", "wav")
            .await
            .unwrap_err();
        match err {
            RequestError::UnknownVoice { available, .. } => {
                assert!(available.contains("en_US-test-medium"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_text_at_limit_is_accepted() {
        let h = harness().await;
        let text = "b".repeat(MAX_TEXT_CHARS);
        let result = h
            .coordinator
            .synthesize(&text, "en_US-test-medium", "wav")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_scratch_files_cleaned_after_success() {
        let h = harness().await;
        let result = h
            .coordinator
            .synthesize("Scratch cleanup", "en_US-test-medium", "mp3")
            .await
            .unwrap();

        let raw = h.scratch_dir.join(format!("{}_raw.wav", result.request_id));
        let converted = h.scratch_dir.join(format!("{}.mp3", result.request_id));
        assert!(!raw.exists());
        assert!(!converted.exists());
        // 缓存文件本身还在
        assert!(result.file_path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_share_one_synthesis() {
        let h = harness_with_delay(Duration::from_millis(100)).await;

        let (a, b) = tokio::join!(
            h.coordinator
                .synthesize("shared phrase", "en_US-test-medium", "wav"),
            h.coordinator
                .synthesize("shared phrase", "en_US-test-medium", "wav"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.file_path, b.file_path);
        // 两个并发请求只触发了一次后端调用
        assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.coordinator.inflight.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_leader_releases_inflight_entry() {
        let h = harness_with_delay(Duration::from_millis(300)).await;

        let coordinator = h.coordinator.clone();
        let leader = tokio::spawn(async move {
            coordinator
                .synthesize("slow phrase", "en_US-test-medium", "wav")
                .await
        });
        // 等 leader 进入后端阶段后掐断连接
        tokio::time::sleep(Duration::from_millis(100)).await;
        leader.abort();
        let _ = leader.await;

        // 条目不能残留，否则这个 key 永远合并不起来
        assert_eq!(h.coordinator.inflight.len(), 0);

        // 同一文本的后续请求照常走完整流程
        let result = h
            .coordinator
            .synthesize("slow phrase", "en_US-test-medium", "wav")
            .await
            .unwrap();
        assert!(!result.cache_hit);
    }

    #[tokio::test]
    async fn test_whitespace_variants_share_cache_entry() {
        let h = harness().await;
        let a = h
            .coordinator
            .synthesize("Hello there", "en_US-test-medium", "wav")
            .await
            .unwrap();
        let b = h
            .coordinator
            .synthesize("  Hello there  ", "en_US-test-medium", "wav")
            .await
            .unwrap();
        assert!(b.cache_hit);
        assert_eq!(a.file_path, b.file_path);
    }
}
