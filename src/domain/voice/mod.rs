//! Voice Context
//!
//! 音色模型聚合与值对象

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::VoiceModel;
pub use errors::VoiceError;
pub use value_objects::{EngineKind, LifecycleState, OutputFormat, VoiceId};
