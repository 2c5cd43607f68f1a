//! WebSocket 升级处理器
//!
//! 连接在升级握手时做一次性认证：query 携带 JWT，校验失败直接拒绝，
//! 不存在半认证的连接。认证通过后身份档案进入活跃缓存，
//! 会话的其余生命周期交给 `SocketSession`。

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;

use domain::ConnectionId;

use crate::state::AppState;
use crate::ws_connection::SocketSession;

/// WebSocket 连接查询参数
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT 凭证
    pub token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<Response, StatusCode> {
    let identity_id = match state.jwt_service.verify_token(&query.token) {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!("WebSocket 升级失败：凭证无效");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 向身份目录取档案；取不到档案的凭证视同无效
    let identity = match state.identities.get(identity_id).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(identity = %identity_id, error = %err, "WebSocket 升级失败：身份不可解析");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 进入在线缓存，偏好的运行时更新落在缓存条目上
    state.identities.insert(identity.clone()).await;

    let connection = ConnectionId::generate();
    tracing::info!(identity = %identity_id, connection = %connection, "WebSocket 升级通过认证");

    Ok(ws.on_upgrade(move |socket| SocketSession::new(state, identity, connection).run(socket)))
}
