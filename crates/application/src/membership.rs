//! 房间成员管理
//!
//! 维护连接与其已加入主题的映射。聊天主题的订阅要求身份是该聊天的
//! 当前参与者；类别/地理主题只是通知兴趣，不做成员检查。
//! 断开连接时隐式退订持有的每一个主题。

use std::sync::Arc;

use config::GeoConfig;
use domain::{
    ChatId, ConnectionId, Coordinates, DomainError, GeoCell, IdentityId, Timestamp, Topic,
};

use crate::broker::NotificationBroker;
use crate::clock::Clock;
use crate::error::ApplicationResult;
use crate::ledger::MessageLedger;

/// 加入聊天后的回执信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinOutcome {
    pub participant_count: usize,
    pub unread: u64,
}

pub struct RoomMembershipManager {
    broker: Arc<NotificationBroker>,
    ledger: Arc<MessageLedger>,
    clock: Arc<dyn Clock>,
    /// 位置订阅的网格粒度与半径上限
    geo: GeoConfig,
}

impl RoomMembershipManager {
    pub fn new(
        broker: Arc<NotificationBroker>,
        ledger: Arc<MessageLedger>,
        clock: Arc<dyn Clock>,
        geo: GeoConfig,
    ) -> Self {
        Self {
            broker,
            ledger,
            clock,
            geo,
        }
    }

    /// 加入聊天：校验参与资格，订阅 `chat:<id>`，刷新 last_seen
    pub async fn join(
        &self,
        connection: ConnectionId,
        identity: IdentityId,
        chat_id: ChatId,
    ) -> ApplicationResult<JoinOutcome> {
        let now: Timestamp = self.clock.now();
        let outcome = self
            .ledger
            .with_chat(chat_id, |chat| {
                let participant_count = chat.participants.len();
                match chat.participant_mut(identity) {
                    Some(participant) => {
                        participant.last_seen = Some(now);
                        Ok(JoinOutcome {
                            participant_count,
                            unread: participant.unread,
                        })
                    }
                    None => Err(DomainError::forbidden("join a chat without membership")),
                }
            })
            .await?;

        self.broker.subscribe(connection, Topic::Chat(chat_id)).await;
        tracing::info!(connection = %connection, identity = %identity, chat_id = %chat_id, "连接加入聊天主题");
        Ok(outcome)
    }

    /// 离开聊天；未订阅时也成功（幂等）
    pub async fn leave(&self, connection: ConnectionId, chat_id: ChatId) {
        self.broker
            .unsubscribe(connection, &Topic::Chat(chat_id))
            .await;
    }

    /// 订阅类别兴趣主题
    pub async fn subscribe_categories(&self, connection: ConnectionId, categories: Vec<String>) {
        for category in categories {
            self.broker
                .subscribe(connection, Topic::category(category))
                .await;
        }
    }

    /// 订阅覆盖给定半径的地理分桶主题
    ///
    /// 半径来自客户端，必须落在 (0, max_radius_m] 内，否则整体拒绝，
    /// 不产生任何订阅。
    pub async fn subscribe_location(
        &self,
        connection: ConnectionId,
        coordinates: Coordinates,
        radius_m: f64,
    ) -> ApplicationResult<Vec<GeoCell>> {
        GeoCell::validate_radius(radius_m, self.geo.max_radius_m)?;
        let cells = GeoCell::covering(coordinates, radius_m, self.geo.cell_size_deg);
        for cell in &cells {
            self.broker
                .subscribe(connection, Topic::GeoBucket(*cell))
                .await;
        }
        tracing::debug!(
            connection = %connection,
            cell_count = cells.len(),
            "连接订阅地理分桶"
        );
        Ok(cells)
    }

    /// 断开连接的隐式清理：释放其持有的全部订阅
    pub async fn release(&self, connection: ConnectionId) -> Vec<Topic> {
        self.broker.drop_connection(connection).await
    }

    pub async fn is_joined(&self, connection: ConnectionId, chat_id: ChatId) -> bool {
        self.broker
            .is_subscribed(connection, &Topic::Chat(chat_id))
            .await
    }
}
