//! 应用层错误定义
//!
//! 区分客户端可修复的请求错误与后端运行错误

use thiserror::Error;

use super::ports::{CacheError, ConversionError, SynthesisError};

/// 初始化错误（进程级致命）
#[derive(Debug, Error)]
pub enum InitError {
    /// 所有音色都未能进入 Ready
    #[error("No valid voice models available after initialization")]
    NoVoicesReady { warnings: Vec<String> },
}

/// 单个请求的错误
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Text cannot be empty")]
    EmptyText,

    #[error("Text too long (maximum {max} characters)")]
    TextTooLong { max: usize },

    #[error("Invalid voice_id '{voice_id}'. Available voices: {available}")]
    UnknownVoice { voice_id: String, available: String },

    #[error("Unsupported format '{requested}'. Supported: {supported}")]
    UnsupportedFormat {
        requested: String,
        supported: &'static str,
    },

    #[error("Synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Format conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RequestError {
    /// 客户端可修复的输入错误（进入任何子进程之前就被拒绝）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RequestError::EmptyText
                | RequestError::TextTooLong { .. }
                | RequestError::UnknownVoice { .. }
                | RequestError::UnsupportedFormat { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(RequestError::EmptyText.is_client_error());
        assert!(RequestError::TextTooLong { max: 5000 }.is_client_error());
        assert!(RequestError::UnknownVoice {
            voice_id: "x".into(),
            available: "a, b".into()
        }
        .is_client_error());
        assert!(!RequestError::Internal("boom".into()).is_client_error());
    }
}
