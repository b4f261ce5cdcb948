//! Format Converter Port - 音频格式转换抽象
//!
//! 将引擎原生 WAV 转码为请求的交付格式，转码委托给外部工具

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::voice::OutputFormat;

/// 转换错误
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Transcoder failed: {0}")]
    ToolFailure(String),

    #[error("Conversion timed out after {0}s")]
    Timeout(u64),

    #[error("Transcoder produced no output file")]
    OutputMissing,

    #[error("Failed to spawn transcoder: {0}")]
    SpawnError(String),

    #[error("Invalid audio input: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ConversionError {
    fn from(e: std::io::Error) -> Self {
        ConversionError::IoError(e.to_string())
    }
}

/// Format Converter Port
///
/// 约定:
/// - Wav 目标为 pass-through（原地改名，不转码）
/// - Ulaw 目标降采样到 8kHz 单声道 μ-law（电话交付）
/// - Mp3 目标为 128kbps 压缩交付
/// - `duration_secs` 优先用元数据探测，探测不可用时退回
///   基于文件大小的粗略估算（非权威值，调用方不得当作精确值）
#[async_trait]
pub trait FormatConverterPort: Send + Sync {
    /// 将 `raw_wav` 转换为 `format`，写到 `final_path`
    async fn convert(
        &self,
        raw_wav: &Path,
        format: OutputFormat,
        final_path: &Path,
    ) -> Result<(), ConversionError>;

    /// 音频时长（秒），失败时返回估算值
    async fn duration_secs(&self, path: &Path) -> f64;
}
