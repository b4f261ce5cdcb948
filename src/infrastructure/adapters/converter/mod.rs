//! Format Converter - 音频格式转换实现
//!
//! 转码委托给外部 ffmpeg/ffprobe；WAV 头的读写为本地实现

mod ffmpeg;
pub(crate) mod wav;

pub use ffmpeg::FfmpegConverter;
