//! Synthesis Backend Port - 合成引擎抽象
//!
//! 对外部合成引擎（子进程）的统一接口；neural 与 placeholder
//! 两种后端都实现此 trait，由音色配置的 engine 标签选择

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 合成引擎输出的最小合法字节数；小于此值视为失败
pub(crate) const MIN_OUTPUT_BYTES: u64 = 1000;

/// 合成错误
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Engine exited with {status:?}: {stderr}")]
    EngineFailure {
        status: Option<i32>,
        stderr: String,
    },

    #[error("Synthesis timed out after {0:?}")]
    Timeout(Duration),

    #[error("Engine produced no output file")]
    OutputMissing,

    #[error("Engine output too small: {0} bytes")]
    OutputTooSmall(u64),

    #[error("Failed to spawn engine: {0}")]
    SpawnError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for SynthesisError {
    fn from(e: std::io::Error) -> Self {
        SynthesisError::IoError(e.to_string())
    }
}

/// Synthesis Backend Port
///
/// 约定:
/// - 文本经标准输入送入引擎，音频写到 `output_path`（WAV）
/// - 超时后子进程被终止，部分输出文件被删除
/// - 成功与失败路径都不留下中间临时文件
#[async_trait]
pub trait SynthesisBackendPort: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        model_path: &Path,
        config_path: &Path,
        output_path: &Path,
        timeout: Duration,
    ) -> Result<(), SynthesisError>;
}
