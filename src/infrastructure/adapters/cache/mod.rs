//! Audio Cache - 合成音频缓存实现

mod file_cache;

pub use file_cache::FileAudioCache;
