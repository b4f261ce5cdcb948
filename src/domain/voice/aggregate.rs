//! Voice Context - Aggregate Root

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use super::{EngineKind, LifecycleState, VoiceError, VoiceId};

/// VoiceModel 聚合根
///
/// 不变量:
/// - 只有当模型与配置制品都存在于本地、配置解析出有效采样率、
///   且冒烟测试合成产出合法音频头之后，才能进入 Ready
/// - 初始化期间由 VoiceRegistry 单写；Ready 之后只读（除显式重新验证）
#[derive(Debug, Clone)]
pub struct VoiceModel {
    id: VoiceId,
    display_name: String,
    gender: Option<String>,
    quality: Option<String>,
    model_url: String,
    config_url: String,
    engine: EngineKind,
    lifecycle_state: LifecycleState,
    local_model_path: Option<PathBuf>,
    local_config_path: Option<PathBuf>,
    sample_rate: Option<u32>,
    validated_at: Option<DateTime<Utc>>,
}

impl VoiceModel {
    /// 从静态配置创建，初始状态 Unfetched
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: VoiceId,
        display_name: impl Into<String>,
        gender: Option<String>,
        quality: Option<String>,
        model_url: impl Into<String>,
        config_url: impl Into<String>,
        engine: EngineKind,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            gender,
            quality,
            model_url: model_url.into(),
            config_url: config_url.into(),
            engine,
            lifecycle_state: LifecycleState::Unfetched,
            local_model_path: None,
            local_config_path: None,
            sample_rate: None,
            validated_at: None,
        }
    }

    /// 开始获取制品
    ///
    /// 允许从 Unfetched 进入，也允许从失败态或 Ready 重新获取（显式重新验证）
    pub fn begin_fetch(&mut self) -> Result<(), VoiceError> {
        match self.lifecycle_state {
            LifecycleState::Unfetched
            | LifecycleState::FetchFailed
            | LifecycleState::ValidationFailed
            | LifecycleState::Ready => {
                self.lifecycle_state = LifecycleState::Fetching;
                self.sample_rate = None;
                self.validated_at = None;
                Ok(())
            }
            from => Err(VoiceError::InvalidTransition {
                from,
                to: LifecycleState::Fetching,
            }),
        }
    }

    /// 制品获取失败（重试耗尽）
    pub fn mark_fetch_failed(&mut self) -> Result<(), VoiceError> {
        self.transition(LifecycleState::Fetching, LifecycleState::FetchFailed)
    }

    /// 制品齐备，进入验证
    pub fn begin_validation(
        &mut self,
        model_path: PathBuf,
        config_path: PathBuf,
    ) -> Result<(), VoiceError> {
        self.transition(LifecycleState::Fetching, LifecycleState::Validating)?;
        self.local_model_path = Some(model_path);
        self.local_config_path = Some(config_path);
        Ok(())
    }

    /// 验证失败
    pub fn mark_validation_failed(&mut self) -> Result<(), VoiceError> {
        self.transition(LifecycleState::Validating, LifecycleState::ValidationFailed)
    }

    /// 验证通过，进入 Ready
    pub fn mark_ready(&mut self, sample_rate: u32) -> Result<(), VoiceError> {
        if self.local_model_path.is_none() || self.local_config_path.is_none() {
            return Err(VoiceError::IncompleteReadyData("missing local artifact paths"));
        }
        if sample_rate == 0 {
            return Err(VoiceError::IncompleteReadyData("sample rate must be non-zero"));
        }
        self.transition(LifecycleState::Validating, LifecycleState::Ready)?;
        self.sample_rate = Some(sample_rate);
        self.validated_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, from: LifecycleState, to: LifecycleState) -> Result<(), VoiceError> {
        if self.lifecycle_state != from {
            return Err(VoiceError::InvalidTransition {
                from: self.lifecycle_state,
                to,
            });
        }
        self.lifecycle_state = to;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle_state == LifecycleState::Ready
    }

    // Getters
    pub fn id(&self) -> &VoiceId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn model_url(&self) -> &str {
        &self.model_url
    }

    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle_state
    }

    pub fn local_model_path(&self) -> Option<&PathBuf> {
        self.local_model_path.as_ref()
    }

    pub fn local_config_path(&self) -> Option<&PathBuf> {
        self.local_config_path.as_ref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn validated_at(&self) -> Option<DateTime<Utc>> {
        self.validated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_voice() -> VoiceModel {
        VoiceModel::new(
            VoiceId::from("en_US-test-medium"),
            "Test Voice",
            Some("female".to_string()),
            Some("medium".to_string()),
            "http://example.com/model.onnx",
            "http://example.com/model.onnx.json",
            EngineKind::Piper,
        )
    }

    #[test]
    fn test_happy_path_to_ready() {
        let mut voice = test_voice();
        assert_eq!(voice.lifecycle_state(), LifecycleState::Unfetched);

        voice.begin_fetch().unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::Fetching);

        voice
            .begin_validation(PathBuf::from("/m.onnx"), PathBuf::from("/m.onnx.json"))
            .unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::Validating);

        voice.mark_ready(22050).unwrap();
        assert!(voice.is_ready());
        assert_eq!(voice.sample_rate(), Some(22050));
        assert!(voice.validated_at().is_some());
    }

    #[test]
    fn test_fetch_failure_path() {
        let mut voice = test_voice();
        voice.begin_fetch().unwrap();
        voice.mark_fetch_failed().unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::FetchFailed);
        assert!(!voice.is_ready());
    }

    #[test]
    fn test_validation_failure_path() {
        let mut voice = test_voice();
        voice.begin_fetch().unwrap();
        voice
            .begin_validation(PathBuf::from("/m.onnx"), PathBuf::from("/m.onnx.json"))
            .unwrap();
        voice.mark_validation_failed().unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::ValidationFailed);
    }

    #[test]
    fn test_ready_requires_validating_state() {
        let mut voice = test_voice();
        assert!(voice.mark_ready(22050).is_err());

        voice.begin_fetch().unwrap();
        // 仍处于 Fetching，不能直接 Ready
        assert!(voice.mark_ready(22050).is_err());
    }

    #[test]
    fn test_ready_rejects_zero_sample_rate() {
        let mut voice = test_voice();
        voice.begin_fetch().unwrap();
        voice
            .begin_validation(PathBuf::from("/m.onnx"), PathBuf::from("/m.onnx.json"))
            .unwrap();
        assert!(voice.mark_ready(0).is_err());
    }

    #[test]
    fn test_refetch_from_failed_state() {
        let mut voice = test_voice();
        voice.begin_fetch().unwrap();
        voice.mark_fetch_failed().unwrap();

        // 显式重新获取
        voice.begin_fetch().unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::Fetching);
    }

    #[test]
    fn test_revalidation_from_ready_clears_metadata() {
        let mut voice = test_voice();
        voice.begin_fetch().unwrap();
        voice
            .begin_validation(PathBuf::from("/m.onnx"), PathBuf::from("/m.onnx.json"))
            .unwrap();
        voice.mark_ready(22050).unwrap();

        voice.begin_fetch().unwrap();
        assert_eq!(voice.lifecycle_state(), LifecycleState::Fetching);
        assert_eq!(voice.sample_rate(), None);
    }
}
