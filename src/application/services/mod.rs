//! Application Services
//!
//! - VoiceRegistry: 音色生命周期编排（获取 → 校验 → 冒烟测试 → Ready）
//! - SynthesisCoordinator: 单个请求的端到端编排（校验 → 缓存 → 合成 → 转码）

mod coordinator;
mod registry;

pub use coordinator::{SynthesisCoordinator, SynthesisResult};
pub use registry::{VoiceRegistry, VoiceSummary};

use std::sync::Arc;

use crate::application::ports::SynthesisBackendPort;
use crate::domain::voice::EngineKind;

/// 按引擎类型选择合成后端
///
/// 两种后端实现同一 trait，由音色配置的 engine 标签选择
#[derive(Clone)]
pub struct BackendSet {
    piper: Arc<dyn SynthesisBackendPort>,
    placeholder: Arc<dyn SynthesisBackendPort>,
}

impl BackendSet {
    pub fn new(
        piper: Arc<dyn SynthesisBackendPort>,
        placeholder: Arc<dyn SynthesisBackendPort>,
    ) -> Self {
        Self { piper, placeholder }
    }

    pub fn for_engine(&self, kind: EngineKind) -> &Arc<dyn SynthesisBackendPort> {
        match kind {
            EngineKind::Piper => &self.piper,
            EngineKind::Placeholder => &self.placeholder,
        }
    }
}
