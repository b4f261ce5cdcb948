//! Audio Cache Port - 内容寻址音频缓存
//!
//! (text, voice, format) → 已生成音频制品的内容寻址存储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::voice::{OutputFormat, VoiceId};

/// 缓存条目小于此字节数视为截断，按 miss 处理
pub const MIN_ENTRY_BYTES: u64 = 100;

/// Audio Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::IoError(e.to_string())
    }
}

/// 缓存条目
///
/// 由 AudioCache 独占持有；只整体替换（原子改名写入），不原地修改
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub file_path: PathBuf,
    pub byte_size: u64,
    /// 音频时长（秒）；可能来自大小估算，非权威值
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Audio Cache Port
///
/// 每个 key 对应缓存目录下一个文件；写入为 copy + 原子改名，
/// 并发的相同请求不会让读者观察到半写文件
#[async_trait]
pub trait AudioCachePort: Send + Sync {
    /// 查找缓存条目；不存在或小于 MIN_ENTRY_BYTES 返回 None
    async fn lookup(&self, key: &str) -> Option<CacheEntry>;

    /// 将 `source` 写入 key 对应的缓存位置
    ///
    /// 超出容量上限时按 LRU 淘汰旧条目
    async fn store(
        &self,
        key: &str,
        source: &Path,
        format: OutputFormat,
        duration_secs: f64,
    ) -> Result<CacheEntry, CacheError>;

    /// 缓存统计
    async fn stats(&self) -> CacheStats;
}

/// 生成缓存 key
///
/// SHA-256(normalized_text, voice_id, format) 的十六进制表示。
/// key 相等必须意味着请求相等，因此要求加密强度哈希
pub fn generate_cache_key(text: &str, voice_id: &VoiceId, format: OutputFormat) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hasher.update([0x1f]);
    hasher.update(voice_id.as_str().as_bytes());
    hasher.update([0x1f]);
    hasher.update(format.extension().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let voice = VoiceId::from("en_US-lessac-medium");
        let a = generate_cache_key("Hello", &voice, OutputFormat::Wav);
        let b = generate_cache_key("Hello", &voice, OutputFormat::Wav);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_key_varies_by_component() {
        let voice = VoiceId::from("en_US-lessac-medium");
        let other = VoiceId::from("en_US-ryan-high");
        let base = generate_cache_key("Hello", &voice, OutputFormat::Wav);

        assert_ne!(base, generate_cache_key("Goodbye", &voice, OutputFormat::Wav));
        assert_ne!(base, generate_cache_key("Hello", &other, OutputFormat::Wav));
        assert_ne!(base, generate_cache_key("Hello", &voice, OutputFormat::Mp3));
    }

    #[test]
    fn test_cache_key_normalizes_whitespace() {
        let voice = VoiceId::from("v1");
        assert_eq!(
            generate_cache_key("  Hello  ", &voice, OutputFormat::Wav),
            generate_cache_key("Hello", &voice, OutputFormat::Wav)
        );
    }

    #[test]
    fn test_cache_key_no_field_ambiguity() {
        // 分隔符保证 (ab, c) 与 (a, bc) 不同
        let v1 = VoiceId::from("ab");
        let v2 = VoiceId::from("b");
        assert_ne!(
            generate_cache_key("x", &v1, OutputFormat::Wav),
            generate_cache_key("xa", &v2, OutputFormat::Wav)
        );
    }
}
