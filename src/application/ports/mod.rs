//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_cache;
mod format_converter;
mod model_fetcher;
mod synthesis_backend;

pub use audio_cache::{
    generate_cache_key, AudioCachePort, CacheEntry, CacheError, CacheStats, MIN_ENTRY_BYTES,
};
pub use format_converter::{ConversionError, FormatConverterPort};
pub use model_fetcher::{FetchError, ModelFetcherPort};
pub use synthesis_backend::{SynthesisBackendPort, SynthesisError};
pub(crate) use synthesis_backend::MIN_OUTPUT_BYTES;
