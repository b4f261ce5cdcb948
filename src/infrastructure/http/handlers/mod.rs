//! HTTP Handlers

mod admin;
mod audio;
mod health;
mod synthesize;
mod voice;

pub use admin::cache_stats;
pub use audio::serve_audio;
pub use health::health_check;
pub use synthesize::synthesize;
pub use voice::list_voices;
