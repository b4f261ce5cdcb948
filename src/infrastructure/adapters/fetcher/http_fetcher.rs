//! HTTP Model Fetcher - 基于 reqwest 的可续传下载器
//!
//! 实现 ModelFetcherPort trait：
//! - 目标路径已有部分文件时带 Range 头续传
//! - 服务端回 200（不支持 Range）则从零重下
//! - 服务端回 416 且本地已有数据视为已完整
//! - 任何错误先删除部分文件再返回

use async_trait::async_trait;
use futures_util::StreamExt;
use http::{header, StatusCode};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::application::ports::{FetchError, ModelFetcherPort};
use crate::config::FetchConfig;

/// HTTP 下载器
pub struct HttpModelFetcher {
    client: Client,
}

impl HttpModelFetcher {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self { client })
    }

    async fn fetch_inner(&self, source_url: &str, dest: &Path) -> Result<u64, FetchError> {
        let existing = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);

        let mut request = self.client.get(source_url);
        if existing > 0 {
            request = request.header(header::RANGE, format!("bytes={}-", existing));
            tracing::debug!(url = source_url, resume_from = existing, "Resuming download");
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();

        let append = match status {
            // 本地已是完整文件
            StatusCode::RANGE_NOT_SATISFIABLE if existing > 0 => {
                tracing::debug!(url = source_url, bytes = existing, "Already complete");
                return Ok(existing);
            }
            StatusCode::PARTIAL_CONTENT => true,
            // 服务端不支持 Range，丢弃已有数据重下
            StatusCode::OK => false,
            s => {
                return Err(FetchError::HttpStatus {
                    status: s.as_u16(),
                    url: source_url.to_string(),
                });
            }
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(dest)
            .await?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        let total = tokio::fs::metadata(dest).await?.len();
        tracing::info!(
            url = source_url,
            written,
            total,
            resumed = append,
            "Download complete"
        );
        Ok(total)
    }
}

#[async_trait]
impl ModelFetcherPort for HttpModelFetcher {
    async fn fetch(&self, source_url: &str, dest: &Path) -> Result<u64, FetchError> {
        match self.fetch_inner(source_url, dest).await {
            Ok(total) => Ok(total),
            Err(e) => {
                // 半成品不留在磁盘上
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::NetworkError(e.to_string())
    }
}
