//! Domain Layer
//!
//! Voice Context: 音色模型生命周期

pub mod voice;
