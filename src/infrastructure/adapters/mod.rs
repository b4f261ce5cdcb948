//! Infrastructure Adapters - 出站端口实现

pub mod backend;
pub mod cache;
pub mod converter;
pub mod fetcher;
