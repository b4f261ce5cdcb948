//! HTTP Layer - 入站 HTTP 服务
//!
//! axum 路由 + 处理器；API key 校验与错误日志为中间件

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use server::HttpServer;
pub use state::AppState;
