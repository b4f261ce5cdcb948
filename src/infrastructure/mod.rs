//! Infrastructure Layer
//!
//! - Adapters: 出站端口的具体实现（下载器、合成引擎、转码器、缓存）
//! - HTTP: 入站 HTTP 服务

pub mod adapters;
pub mod http;
