//! Synthesis Backends - 合成引擎实现
//!
//! - PiperBackend: 外部 piper 子进程（神经网络模型）
//! - PlaceholderBackend: 信号合成占位引擎（无模型依赖）

mod piper;
mod placeholder;

pub use piper::PiperBackend;
pub use placeholder::PlaceholderBackend;
