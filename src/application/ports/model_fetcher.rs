//! Model Fetcher Port - 模型制品下载抽象
//!
//! 可续传、流式写盘的网络下载器接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// 下载错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Request timeout")]
    Timeout,

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        FetchError::IoError(e.to_string())
    }
}

/// Model Fetcher Port
///
/// 约定:
/// - 目标路径已有部分文件时发起 Range 续传；服务端不支持续传则丢弃重下
/// - 任何错误都先删除部分文件再返回，不留下看似完整的损坏制品
/// - 对已完整的文件重复调用是 no-op（仅做大小检查）
/// - 重试策略由调用方（VoiceRegistry）负责
#[async_trait]
pub trait ModelFetcherPort: Send + Sync {
    /// 下载 `source_url` 到 `dest`，返回本次写入的字节数
    async fn fetch(&self, source_url: &str, dest: &Path) -> Result<u64, FetchError>;
}
