//! 在线状态注册表
//!
//! 跟踪哪些身份当前持有活跃连接。多设备规则：只要还有一个连接
//! 注册在身份名下就算在线；最后一个连接移除时翻转为离线，条目
//! 随之清除，最终的 `last_active` 只随离线广播带出。注册表中
//! 只保留在线身份，历史最后在线时间归身份目录负责。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use domain::{ConnectionId, IdentityId, ServerEvent, Timestamp, Topic};

use crate::broker::NotificationBroker;
use crate::clock::Clock;

/// 一次连接增删引起的在线状态变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// 身份由离线转为在线（第一个连接）
    CameOnline,
    /// 身份由在线转为离线（最后一个连接移除）
    WentOffline,
    /// 其他连接仍在，状态未变
    Unchanged,
}

struct PresenceEntry {
    connections: HashSet<ConnectionId>,
    last_active: Timestamp,
}

pub struct PresenceRegistry {
    entries: RwLock<HashMap<IdentityId, PresenceEntry>>,
    broker: Arc<NotificationBroker>,
    clock: Arc<dyn Clock>,
}

impl PresenceRegistry {
    pub fn new(broker: Arc<NotificationBroker>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            broker,
            clock,
        }
    }

    /// 连接注册到身份名下；首个连接触发上线广播
    pub async fn mark_online(
        &self,
        identity: IdentityId,
        connection: ConnectionId,
    ) -> PresenceTransition {
        let now = self.clock.now();
        let transition = {
            let mut entries = self.entries.write().await;
            let entry = entries.entry(identity).or_insert_with(|| PresenceEntry {
                connections: HashSet::new(),
                last_active: now,
            });
            let was_online = !entry.connections.is_empty();
            entry.connections.insert(connection);
            entry.last_active = now;
            if was_online {
                PresenceTransition::Unchanged
            } else {
                PresenceTransition::CameOnline
            }
        };

        if transition == PresenceTransition::CameOnline {
            tracing::info!(identity = %identity, "身份上线");
            self.broker
                .publish(&Topic::Global, ServerEvent::UserOnline { identity })
                .await;
        }
        transition
    }

    /// 连接从身份名下移除；最后一个连接触发离线广播并清除条目
    pub async fn mark_offline(
        &self,
        identity: IdentityId,
        connection: ConnectionId,
    ) -> PresenceTransition {
        let now = self.clock.now();
        let transition = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(&identity) {
                Some(entry) => {
                    entry.connections.remove(&connection);
                    if entry.connections.is_empty() {
                        entries.remove(&identity);
                        PresenceTransition::WentOffline
                    } else {
                        PresenceTransition::Unchanged
                    }
                }
                None => PresenceTransition::Unchanged,
            }
        };

        if transition == PresenceTransition::WentOffline {
            tracing::info!(identity = %identity, "身份离线");
            self.broker
                .publish(
                    &Topic::Global,
                    ServerEvent::UserOffline {
                        identity,
                        last_active: now,
                    },
                )
                .await;
        }
        transition
    }

    pub async fn is_online(&self, identity: IdentityId) -> bool {
        self.entries
            .read()
            .await
            .get(&identity)
            .map(|entry| !entry.connections.is_empty())
            .unwrap_or(false)
    }

    pub async fn last_active(&self, identity: IdentityId) -> Option<Timestamp> {
        self.entries
            .read()
            .await
            .get(&identity)
            .map(|entry| entry.last_active)
    }

    /// 心跳等活动信号刷新活跃时间
    pub async fn touch(&self, identity: IdentityId) {
        let now = self.clock.now();
        if let Some(entry) = self.entries.write().await.get_mut(&identity) {
            entry.last_active = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use uuid::Uuid;

    fn registry() -> PresenceRegistry {
        PresenceRegistry::new(Arc::new(NotificationBroker::new()), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn multi_device_stays_online_until_last_disconnect() {
        let registry = registry();
        let identity = IdentityId::new(Uuid::new_v4());
        let first = ConnectionId::generate();
        let second = ConnectionId::generate();

        assert_eq!(
            registry.mark_online(identity, first).await,
            PresenceTransition::CameOnline
        );
        assert_eq!(
            registry.mark_online(identity, second).await,
            PresenceTransition::Unchanged
        );

        // 断开一个设备仍在线
        assert_eq!(
            registry.mark_offline(identity, first).await,
            PresenceTransition::Unchanged
        );
        assert!(registry.is_online(identity).await);

        // 断开最后一个设备才离线，条目随之清除
        assert_eq!(
            registry.mark_offline(identity, second).await,
            PresenceTransition::WentOffline
        );
        assert!(!registry.is_online(identity).await);
        assert!(registry.last_active(identity).await.is_none());
    }

    #[tokio::test]
    async fn entry_is_evicted_after_last_disconnect() {
        let broker = Arc::new(NotificationBroker::new());
        let registry = PresenceRegistry::new(broker.clone(), Arc::new(SystemClock));

        let watcher = ConnectionId::generate();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        broker.register(watcher, tx).await;
        broker.subscribe(watcher, Topic::Global).await;

        let identity = IdentityId::new(Uuid::new_v4());
        let conn = ConnectionId::generate();
        registry.mark_online(identity, conn).await;
        registry.mark_offline(identity, conn).await;

        // 最终活跃时间随离线广播带出，注册表本身不再保留条目
        let _ = rx.try_recv().expect("online event");
        match rx.try_recv().expect("offline event") {
            ServerEvent::UserOffline { last_active, .. } => {
                let _ = last_active;
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(registry.last_active(identity).await.is_none());

        // 重新上线从全新条目开始
        assert_eq!(
            registry.mark_online(identity, ConnectionId::generate()).await,
            PresenceTransition::CameOnline
        );
    }

    #[tokio::test]
    async fn transitions_broadcast_on_global_topic() {
        let broker = Arc::new(NotificationBroker::new());
        let registry = PresenceRegistry::new(broker.clone(), Arc::new(SystemClock));

        let watcher = ConnectionId::generate();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        broker.register(watcher, tx).await;
        broker.subscribe(watcher, Topic::Global).await;

        let identity = IdentityId::new(Uuid::new_v4());
        let conn = ConnectionId::generate();
        registry.mark_online(identity, conn).await;
        registry.mark_offline(identity, conn).await;

        match rx.try_recv().expect("online event") {
            ServerEvent::UserOnline { identity: seen } => assert_eq!(seen, identity),
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.try_recv().expect("offline event") {
            ServerEvent::UserOffline { identity: seen, .. } => assert_eq!(seen, identity),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn offline_for_unknown_identity_is_a_no_op() {
        let registry = registry();
        let identity = IdentityId::new(Uuid::new_v4());
        assert_eq!(
            registry
                .mark_offline(identity, ConnectionId::generate())
                .await,
            PresenceTransition::Unchanged
        );
    }
}
