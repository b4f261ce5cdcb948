//! Voice Context - Value Objects

use serde::{Deserialize, Serialize};

/// 音色唯一标识
///
/// 稳定字符串 key（如 "en_US-lessac-medium"），来自静态配置，
/// 同时作为磁盘目录名与缓存 key 的组成部分
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// 合成后端引擎类型
///
/// 由音色配置显式指定，而不是根据 voice id 字符串分支
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Piper 神经网络模型
    #[default]
    Piper,
    /// 信号合成占位引擎（无真实模型）
    Placeholder,
}

/// 音色生命周期状态
///
/// 状态机: Unfetched → Fetching → {FetchFailed | Validating} → {ValidationFailed | Ready}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    Unfetched,
    Fetching,
    FetchFailed,
    Validating,
    ValidationFailed,
    Ready,
}

/// 输出音频格式
///
/// wire 名称同时接受规格名（native/telephony/compressed）与具体格式名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 引擎原生输出（16-bit PCM WAV）
    #[default]
    #[serde(alias = "native")]
    Wav,
    /// 电话线路交付（8kHz 单声道 μ-law）
    #[serde(alias = "telephony")]
    Ulaw,
    /// 压缩交付（128kbps MP3）
    #[serde(alias = "compressed")]
    Mp3,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "wav" | "native" => Some(Self::Wav),
            "ulaw" | "telephony" => Some(Self::Ulaw),
            "mp3" | "compressed" => Some(Self::Mp3),
            _ => None,
        }
    }

    /// 文件扩展名（缓存文件命名使用）
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Ulaw => "ulaw",
            Self::Mp3 => "mp3",
        }
    }

    /// HTTP Content-Type
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Ulaw => "audio/basic",
            Self::Mp3 => "audio/mpeg",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_name_accepts_both_namings() {
        assert_eq!(OutputFormat::from_name("wav"), Some(OutputFormat::Wav));
        assert_eq!(OutputFormat::from_name("native"), Some(OutputFormat::Wav));
        assert_eq!(OutputFormat::from_name("ulaw"), Some(OutputFormat::Ulaw));
        assert_eq!(
            OutputFormat::from_name("telephony"),
            Some(OutputFormat::Ulaw)
        );
        assert_eq!(OutputFormat::from_name("MP3"), Some(OutputFormat::Mp3));
        assert_eq!(
            OutputFormat::from_name("compressed"),
            Some(OutputFormat::Mp3)
        );
        assert_eq!(OutputFormat::from_name("flac"), None);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(OutputFormat::Wav.extension(), "wav");
        assert_eq!(OutputFormat::Ulaw.extension(), "ulaw");
        assert_eq!(OutputFormat::Mp3.extension(), "mp3");
    }

    #[test]
    fn test_engine_kind_default_is_piper() {
        assert_eq!(EngineKind::default(), EngineKind::Piper);
    }
}
