//! File Audio Cache - 目录文件缓存
//!
//! 每个 key 对应缓存目录下一个文件（<key>.<ext>），磁盘即真相：
//! 内存索引只是加速结构，启动时扫描目录重建。
//! 写入为 copy + 原子改名，读者不会看到半写文件。
//! 超出容量上限按 LRU 淘汰。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::application::ports::{
    AudioCachePort, CacheEntry, CacheError, CacheStats, MIN_ENTRY_BYTES,
};
use crate::config::CacheConfig;
use crate::domain::voice::OutputFormat;

struct IndexEntry {
    file_path: PathBuf,
    byte_size: u64,
    duration_secs: f64,
    created_at: DateTime<Utc>,
    /// 逻辑时钟序号，越大越新
    last_used: AtomicI64,
}

/// 文件系统音频缓存
pub struct FileAudioCache {
    dir: PathBuf,
    max_size_bytes: u64,
    entries: DashMap<String, IndexEntry>,
    /// LRU 逻辑时钟
    clock: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FileAudioCache {
    /// 打开缓存目录并扫描重建索引
    pub async fn open(cfg: &CacheConfig) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(&cfg.dir).await?;

        let cache = Self {
            dir: cfg.dir.clone(),
            max_size_bytes: cfg.max_size_bytes,
            entries: DashMap::new(),
            clock: AtomicI64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        cache.rebuild_index().await?;
        Ok(cache)
    }

    /// 扫描目录，mtime 顺序决定初始 LRU 次序
    async fn rebuild_index(&self) -> Result<(), CacheError> {
        let mut scanned: Vec<(String, PathBuf, u64, std::time::SystemTime)> = Vec::new();

        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let meta = match item.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let Some(key) = cache_key_of(&path) else {
                tracing::debug!(path = %path.display(), "Skipping foreign file in cache dir");
                continue;
            };

            // 截断的条目直接清掉，留着只会变成假命中
            if meta.len() <= MIN_ENTRY_BYTES {
                tracing::warn!(path = %path.display(), bytes = meta.len(), "Removing truncated cache entry");
                let _ = tokio::fs::remove_file(&path).await;
                continue;
            }

            let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            scanned.push((key, path, meta.len(), mtime));
        }

        scanned.sort_by_key(|(_, _, _, mtime)| *mtime);
        let count = scanned.len();
        for (key, path, size, mtime) in scanned {
            let seq = self.clock.fetch_add(1, Ordering::SeqCst);
            self.entries.insert(
                key,
                IndexEntry {
                    file_path: path,
                    byte_size: size,
                    // 重建时没有权威时长，按大小估算
                    duration_secs: size as f64 / (1024.0 * 1024.0) * 60.0,
                    created_at: DateTime::<Utc>::from(mtime),
                    last_used: AtomicI64::new(seq),
                },
            );
        }

        if count > 0 {
            tracing::info!(entries = count, dir = %self.dir.display(), "Cache index rebuilt");
        }
        Ok(())
    }

    fn touch(&self, entry: &IndexEntry) {
        let seq = self.clock.fetch_add(1, Ordering::SeqCst);
        entry.last_used.store(seq, Ordering::SeqCst);
    }

    fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.byte_size).sum()
    }

    /// 超出容量时按 last_used 从旧到新淘汰；刚写入的 key 不参与
    async fn evict_if_needed(&self, protect_key: &str) {
        while self.total_size() > self.max_size_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|e| e.key() != protect_key)
                .min_by_key(|e| e.last_used.load(Ordering::SeqCst))
                .map(|e| e.key().clone());

            let Some(key) = victim else { break };
            if let Some((_, removed)) = self.entries.remove(&key) {
                tracing::info!(
                    key = %&key[..12.min(key.len())],
                    bytes = removed.byte_size,
                    "Evicting cache entry"
                );
                let _ = tokio::fs::remove_file(&removed.file_path).await;
            }
        }
    }

    fn to_entry(&self, key: &str, indexed: &IndexEntry) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            file_path: indexed.file_path.clone(),
            byte_size: indexed.byte_size,
            duration_secs: indexed.duration_secs,
            created_at: indexed.created_at,
        }
    }
}

#[async_trait]
impl AudioCachePort for FileAudioCache {
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let path = match self.entries.get(key) {
            Some(indexed) => indexed.file_path.clone(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        // 磁盘即真相：文件被外部删除或截断时索引失效
        let valid = tokio::fs::metadata(&path)
            .await
            .map(|m| m.len() > MIN_ENTRY_BYTES)
            .unwrap_or(false);
        if !valid {
            self.entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let indexed = self.entries.get(key)?;
        self.touch(&indexed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(self.to_entry(key, &indexed))
    }

    async fn store(
        &self,
        key: &str,
        source: &Path,
        format: OutputFormat,
        duration_secs: f64,
    ) -> Result<CacheEntry, CacheError> {
        let final_path = self.dir.join(format!("{}.{}", key, format.extension()));
        // 临时名带随机后缀：同 key 的并发 store 各写各的，不互相踩
        let tmp_path = self
            .dir
            .join(format!("{}.{}.tmp", key, &uuid::Uuid::new_v4().simple().to_string()[..8]));

        // copy 到临时名，改名原子落位
        tokio::fs::copy(source, &tmp_path).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;

        let byte_size = tokio::fs::metadata(&final_path).await?.len();
        let seq = self.clock.fetch_add(1, Ordering::SeqCst);
        let indexed = IndexEntry {
            file_path: final_path,
            byte_size,
            duration_secs,
            created_at: Utc::now(),
            last_used: AtomicI64::new(seq),
        };
        let entry = self.to_entry(key, &indexed);
        self.entries.insert(key.to_string(), indexed);

        self.evict_if_needed(key).await;
        Ok(entry)
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_size_bytes: self.total_size(),
            max_size_bytes: self.max_size_bytes,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// 从文件名还原缓存 key：64 位十六进制 stem + 已知扩展名
fn cache_key_of(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    if stem.len() != 64 || !stem.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    OutputFormat::from_name(ext)?;
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_key(seed: u8) -> String {
        format!("{:02x}", seed).repeat(32)
    }

    async fn cache_with_limit(dir: &Path, max_size_bytes: u64) -> FileAudioCache {
        FileAudioCache::open(&CacheConfig {
            dir: dir.to_path_buf(),
            max_size_bytes,
        })
        .await
        .unwrap()
    }

    async fn write_source(dir: &Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join(name);
        tokio::fs::write(&path, vec![0xAAu8; bytes]).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let dir = tempdir().unwrap();
        let cache = cache_with_limit(&dir.path().join("cache"), u64::MAX).await;
        let source = write_source(dir.path(), "src.wav", 5000).await;

        let key = test_key(1);
        let stored = cache
            .store(&key, &source, OutputFormat::Wav, 2.5)
            .await
            .unwrap();
        assert_eq!(stored.byte_size, 5000);
        assert!(stored.file_path.ends_with(format!("{}.wav", key)));

        let found = cache.lookup(&key).await.unwrap();
        assert_eq!(found.file_path, stored.file_path);
        assert_eq!(found.duration_secs, 2.5);

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 0);
    }

    #[tokio::test]
    async fn test_lookup_missing_counts_miss() {
        let dir = tempdir().unwrap();
        let cache = cache_with_limit(dir.path(), u64::MAX).await;
        assert!(cache.lookup(&test_key(9)).await.is_none());
        assert_eq!(cache.stats().await.miss_count, 1);
    }

    #[tokio::test]
    async fn test_truncated_entry_treated_as_miss() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let cache = cache_with_limit(&cache_dir, u64::MAX).await;
        let source = write_source(dir.path(), "src.wav", 5000).await;

        let key = test_key(2);
        let stored = cache
            .store(&key, &source, OutputFormat::Wav, 1.0)
            .await
            .unwrap();

        // 外部截断文件
        tokio::fs::write(&stored.file_path, b"tiny").await.unwrap();
        assert!(cache.lookup(&key).await.is_none());
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_index_rebuilt_from_disk() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let source = write_source(dir.path(), "src.wav", 4000).await;
        let key = test_key(3);

        {
            let cache = cache_with_limit(&cache_dir, u64::MAX).await;
            cache
                .store(&key, &source, OutputFormat::Mp3, 3.0)
                .await
                .unwrap();
        }

        // 重新打开，索引从目录重建
        let reopened = cache_with_limit(&cache_dir, u64::MAX).await;
        let found = reopened.lookup(&key).await.unwrap();
        assert_eq!(found.byte_size, 4000);
        assert_eq!(reopened.stats().await.total_entries, 1);
    }

    #[tokio::test]
    async fn test_rebuild_discards_truncated_and_foreign_files() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        tokio::fs::create_dir_all(&cache_dir).await.unwrap();

        // 截断条目、外来文件、合法条目
        tokio::fs::write(cache_dir.join(format!("{}.wav", test_key(4))), b"x")
            .await
            .unwrap();
        tokio::fs::write(cache_dir.join("notes.txt"), vec![0u8; 500])
            .await
            .unwrap();
        tokio::fs::write(
            cache_dir.join(format!("{}.wav", test_key(5))),
            vec![0u8; 2000],
        )
        .await
        .unwrap();

        let cache = cache_with_limit(&cache_dir, u64::MAX).await;
        assert_eq!(cache.stats().await.total_entries, 1);
        assert!(cache.lookup(&test_key(5)).await.is_some());
        // 截断条目被清理
        assert!(!cache_dir.join(format!("{}.wav", test_key(4))).exists());
    }

    #[tokio::test]
    async fn test_lru_eviction_prefers_stale_entries() {
        let dir = tempdir().unwrap();
        // 容量只够两个 2000 字节条目
        let cache = cache_with_limit(&dir.path().join("cache"), 4500).await;
        let source = write_source(dir.path(), "src.wav", 2000).await;

        let (k1, k2, k3) = (test_key(0x10), test_key(0x20), test_key(0x30));
        cache.store(&k1, &source, OutputFormat::Wav, 1.0).await.unwrap();
        cache.store(&k2, &source, OutputFormat::Wav, 1.0).await.unwrap();

        // 触摸 k1，让 k2 成为最旧
        cache.lookup(&k1).await.unwrap();

        cache.store(&k3, &source, OutputFormat::Wav, 1.0).await.unwrap();

        assert!(cache.lookup(&k1).await.is_some());
        assert!(cache.lookup(&k2).await.is_none());
        assert!(cache.lookup(&k3).await.is_some());
    }
}
