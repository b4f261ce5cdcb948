//! Vocalis - 语音合成服务
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Voice Context: 音色聚合根与生命周期状态机
//!
//! 应用层 (application/):
//! - Ports: 出站端口（ModelFetcher, SynthesisBackend, FormatConverter, AudioCache）
//! - Services: VoiceRegistry（音色生命周期编排）、SynthesisCoordinator（请求编排）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API（axum）
//! - Adapters: HTTP 下载器、Piper/Placeholder 合成后端、FFmpeg 转码器、文件缓存

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
