//! Application Layer
//!
//! - Ports: 出站端口定义（ModelFetcher, SynthesisBackend, FormatConverter, AudioCache）
//! - Services: VoiceRegistry（生命周期编排）与 SynthesisCoordinator（请求编排）

pub mod error;
pub mod ports;
pub mod services;

pub use error::{InitError, RequestError};
pub use services::{
    BackendSet, SynthesisCoordinator, SynthesisResult, VoiceRegistry, VoiceSummary,
};
