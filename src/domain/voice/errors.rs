//! Voice Context - Domain Errors

use thiserror::Error;

use super::LifecycleState;

/// 音色领域错误
#[derive(Debug, Error)]
pub enum VoiceError {
    /// 非法状态迁移
    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// 标记 Ready 时缺少必要数据
    #[error("Cannot mark voice ready: {0}")]
    IncompleteReadyData(&'static str),
}
