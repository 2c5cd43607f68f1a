//! Web API 层。
//!
//! 提供 Axum 路由：一次性认证的持久 WebSocket 事件通道，
//! 以及协作子系统投递警报的 HTTP 入口。

mod auth;
mod error;
mod routes;
mod state;
mod websocket;
mod ws_connection;

pub use auth::JwtService;
pub use config::JwtConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
