//! WebSocket 会话
//!
//! 封装单个已认证连接的完整生命周期：注册到通知代理、自动订阅
//! 私有主题、在线登记、事件收发循环，以及断开时的隐式清理。
//! 入站帧解析或处理失败不终止连接，以 `error` 事件回给客户端。

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use application::{ApplicationError, PresenceTransition};
use domain::{
    Alert, AlertKind, ClientEvent, ConnectionId, Identity, ServerEvent, Topic,
};

use crate::state::AppState;

/// WebSocket 写操作命令
///
/// 命令模式统一管理对 WebSocket sender 的全部写操作
#[derive(Debug)]
enum WsCommand {
    SendText(String),
    SendPong(Vec<u8>),
}

pub struct SocketSession {
    state: AppState,
    identity: Identity,
    connection: ConnectionId,
}

impl SocketSession {
    pub fn new(state: AppState, identity: Identity, connection: ConnectionId) -> Self {
        Self {
            state,
            identity,
            connection,
        }
    }

    /// 运行会话主循环，直到任一方向断开
    pub async fn run(self, socket: WebSocket) {
        let connection = self.connection;
        let identity_id = self.identity.id;

        // 注册出站队列并订阅私有主题
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        self.state.broker.register(connection, event_tx.clone()).await;
        self.state
            .broker
            .subscribe(connection, Topic::User(identity_id))
            .await;
        // 每个在线连接都是全站广播的受众
        self.state.broker.subscribe(connection, Topic::Global).await;
        self.state.presence.mark_online(identity_id, connection).await;

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：出站事件与写命令都经此串行落到 socket 上
        let send_task = {
            let cmd_tx_for_events = cmd_tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(cmd) = cmd_rx.recv() => {
                            let outcome = match cmd {
                                WsCommand::SendText(text) => {
                                    sender.send(WsMessage::Text(text.into())).await
                                }
                                WsCommand::SendPong(data) => {
                                    sender.send(WsMessage::Pong(data.into())).await
                                }
                            };
                            if outcome.is_err() {
                                break;
                            }
                        }
                        Some(event) = event_rx.recv() => {
                            let payload = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(err) => {
                                    tracing::warn!(error = %err, event = event.name(), "出站事件序列化失败");
                                    continue;
                                }
                            };
                            if cmd_tx_for_events.send(WsCommand::SendText(payload)).await.is_err() {
                                break;
                            }
                        }
                        else => break,
                    }
                }
                tracing::debug!(connection = %connection, "WebSocket 发送任务结束");
            })
        };

        // 接收任务：解析客户端事件并分派
        let recv_task = {
            let state = self.state.clone();
            let identity = self.identity.clone();
            tokio::spawn(async move {
                while let Some(Ok(message)) = incoming.next().await {
                    match message {
                        WsMessage::Text(text) => {
                            let event: ClientEvent = match serde_json::from_str(&text) {
                                Ok(event) => event,
                                Err(err) => {
                                    tracing::debug!(connection = %connection, error = %err, "入站帧无法解析");
                                    let _ = event_tx.send(ServerEvent::Error {
                                        kind: "invalid_argument".to_string(),
                                        message: format!("malformed event: {err}"),
                                    });
                                    continue;
                                }
                            };
                            if let Err(err) =
                                handle_event(&state, &identity, connection, event, &event_tx).await
                            {
                                tracing::debug!(
                                    connection = %connection,
                                    identity = %identity.id,
                                    kind = err.kind(),
                                    error = %err,
                                    "客户端事件被拒绝"
                                );
                                let _ = event_tx.send(ServerEvent::Error {
                                    kind: err.kind().to_string(),
                                    message: err.to_string(),
                                });
                            }
                        }
                        WsMessage::Ping(data) => {
                            if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        WsMessage::Pong(_) => {
                            // 心跳回执刷新活跃时间
                            state.presence.touch(identity.id).await;
                        }
                        WsMessage::Close(_) => {
                            tracing::debug!(connection = %connection, "客户端关闭连接");
                            break;
                        }
                        WsMessage::Binary(_) => {
                            tracing::debug!(connection = %connection, "忽略二进制帧");
                        }
                    }
                }
                tracing::debug!(connection = %connection, "WebSocket 接收任务结束");
            })
        };

        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        // 隐式清理：退订全部主题、摘除出站队列、离线登记
        let released = self.state.membership.release(connection).await;
        let transition = self
            .state
            .presence
            .mark_offline(identity_id, connection)
            .await;
        if transition == PresenceTransition::WentOffline {
            self.state.identities.invalidate(identity_id).await;
        }
        tracing::info!(
            connection = %connection,
            identity = %identity_id,
            released_topics = released.len(),
            "WebSocket 连接已清理"
        );
    }
}

/// 分派单个客户端事件
///
/// 每个入站事件要么产生零或多个出站事件，要么以错误拒绝；
/// 拒绝由调用方转成 `error` 事件回投，不影响连接本身。
async fn handle_event(
    state: &AppState,
    identity: &Identity,
    connection: ConnectionId,
    event: ClientEvent,
    event_tx: &mpsc::UnboundedSender<ServerEvent>,
) -> Result<(), ApplicationError> {
    match event {
        ClientEvent::JoinChat { chat_id } => {
            let outcome = state.membership.join(connection, identity.id, chat_id).await?;
            let _ = event_tx.send(ServerEvent::JoinedChat {
                chat_id,
                participant_count: outcome.participant_count,
                unread: outcome.unread,
            });
        }
        ClientEvent::LeaveChat { chat_id } => {
            state.membership.leave(connection, chat_id).await;
            let _ = event_tx.send(ServerEvent::LeftChat { chat_id });
        }
        ClientEvent::SendMessage {
            chat_id,
            content,
            reply_to,
        } => {
            state.ledger.append(chat_id, identity.id, content, reply_to).await?;
        }
        ClientEvent::MarkAsRead {
            chat_id,
            message_id,
        } => {
            state.ledger.mark_read(chat_id, identity.id, message_id).await?;
        }
        ClientEvent::AddReaction {
            chat_id,
            message_id,
            emoji,
        } => {
            state.ledger.react(chat_id, identity.id, message_id, emoji).await?;
        }
        ClientEvent::EditMessage {
            chat_id,
            message_id,
            new_content,
        } => {
            state
                .ledger
                .edit(chat_id, identity.id, message_id, new_content)
                .await?;
        }
        ClientEvent::DeleteMessage {
            chat_id,
            message_id,
        } => {
            state.ledger.delete(chat_id, identity.id, message_id).await?;
        }
        ClientEvent::StartTyping { chat_id } => {
            require_joined(state, connection, chat_id).await?;
            state
                .broker
                .publish(
                    &Topic::Chat(chat_id),
                    ServerEvent::UserTyping {
                        chat_id,
                        identity: identity.id,
                    },
                )
                .await;
        }
        ClientEvent::StopTyping { chat_id } => {
            require_joined(state, connection, chat_id).await?;
            state
                .broker
                .publish(
                    &Topic::Chat(chat_id),
                    ServerEvent::UserStoppedTyping {
                        chat_id,
                        identity: identity.id,
                    },
                )
                .await;
        }
        ClientEvent::SubscribeLocationAlerts {
            coordinates,
            radius_m,
        } => {
            state
                .membership
                .subscribe_location(connection, coordinates, radius_m)
                .await?;
        }
        ClientEvent::SubscribeResourceAlerts { categories } => {
            state.membership.subscribe_categories(connection, categories).await;
        }
        ClientEvent::SendEmergencyAlert {
            title,
            message,
            location,
            urgency,
            category,
        } => {
            let alert = Alert::new(
                AlertKind::Emergency { location, category },
                title,
                message,
                urgency,
                identity.id,
                state.dispatcher.clock().now(),
            );
            state.dispatcher.dispatch(alert).await?;
        }
        ClientEvent::UpdateNotificationPreferences { preferences } => {
            state
                .identities
                .update_preferences(identity.id, preferences)
                .await;
        }
    }
    Ok(())
}

async fn require_joined(
    state: &AppState,
    connection: ConnectionId,
    chat_id: domain::ChatId,
) -> Result<(), ApplicationError> {
    if !state.membership.is_joined(connection, chat_id).await {
        return Err(domain::DomainError::forbidden("signal typing in a chat not joined").into());
    }
    Ok(())
}
