//! Model Fetcher - 模型制品下载实现

mod http_fetcher;

pub use http_fetcher::HttpModelFetcher;
