//! 通知代理
//!
//! 命名主题上的发布/订阅层。每个连接注册一个出站队列
//! （unbounded mpsc），发布时把事件克隆进当前订阅者的队列即返回，
//! 不等待远端确认。单个主题内事件按发布顺序投递；跨主题无顺序保证。
//!
//! 订阅集合与发送端是读多写少的全局结构，按主题/连接分别用
//! RwLock 保护，避免无关聊天在一把全局锁上串行化。

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};

use domain::{ConnectionId, ServerEvent, Topic};

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
pub struct NotificationBroker {
    /// 主题 → 订阅连接集合
    topics: RwLock<HashMap<Topic, HashSet<ConnectionId>>>,
    /// 连接 → 已订阅主题（断开时反向清理用）
    subscriptions: RwLock<HashMap<ConnectionId, HashSet<Topic>>>,
    /// 连接 → 出站队列
    senders: RwLock<HashMap<ConnectionId, EventSender>>,
}

impl NotificationBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接的出站队列；必须先于任何订阅调用
    pub async fn register(&self, connection: ConnectionId, sender: EventSender) {
        self.senders.write().await.insert(connection, sender);
    }

    /// 订阅；幂等
    pub async fn subscribe(&self, connection: ConnectionId, topic: Topic) {
        let mut topics = self.topics.write().await;
        let mut subscriptions = self.subscriptions.write().await;
        topics.entry(topic.clone()).or_default().insert(connection);
        subscriptions.entry(connection).or_default().insert(topic);
    }

    /// 退订；幂等
    pub async fn unsubscribe(&self, connection: ConnectionId, topic: &Topic) {
        let mut topics = self.topics.write().await;
        let mut subscriptions = self.subscriptions.write().await;
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(&connection);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
        if let Some(held) = subscriptions.get_mut(&connection) {
            held.remove(topic);
            if held.is_empty() {
                subscriptions.remove(&connection);
            }
        }
    }

    pub async fn is_subscribed(&self, connection: ConnectionId, topic: &Topic) -> bool {
        self.subscriptions
            .read()
            .await
            .get(&connection)
            .map(|held| held.contains(topic))
            .unwrap_or(false)
    }

    pub async fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// 断开连接：释放其全部订阅和出站队列，返回曾持有的主题
    pub async fn drop_connection(&self, connection: ConnectionId) -> Vec<Topic> {
        self.senders.write().await.remove(&connection);

        let mut topics = self.topics.write().await;
        let mut subscriptions = self.subscriptions.write().await;
        let held = subscriptions.remove(&connection).unwrap_or_default();
        for topic in &held {
            if let Some(subscribers) = topics.get_mut(topic) {
                subscribers.remove(&connection);
                if subscribers.is_empty() {
                    topics.remove(topic);
                }
            }
        }
        held.into_iter().collect()
    }

    /// 发布事件到主题的所有当前订阅者
    ///
    /// 尽力投递：出站队列已关闭的订阅者被跳过并惰性回收，
    /// 发布方永远不会因此收到错误。返回入队成功的订阅者数量。
    pub async fn publish(&self, topic: &Topic, event: ServerEvent) -> usize {
        let subscribers: Vec<ConnectionId> = {
            let topics = self.topics.read().await;
            match topics.get(topic) {
                Some(subscribers) => subscribers.iter().copied().collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        {
            let senders = self.senders.read().await;
            for connection in subscribers {
                match senders.get(&connection) {
                    Some(sender) if sender.send(event.clone()).is_ok() => delivered += 1,
                    _ => stale.push(connection),
                }
            }
        }

        for connection in stale {
            tracing::debug!(connection = %connection, topic = %topic, "回收已失效的订阅连接");
            self.drop_connection(connection).await;
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::Error {
            kind: "test".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_only_topic_subscribers() {
        let broker = NotificationBroker::new();
        let conn_a = ConnectionId::generate();
        let conn_b = ConnectionId::generate();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        broker.register(conn_a, tx_a).await;
        broker.register(conn_b, tx_b).await;

        let topic_a = Topic::category("water");
        let topic_b = Topic::category("food");
        broker.subscribe(conn_a, topic_a.clone()).await;
        broker.subscribe(conn_b, topic_b.clone()).await;

        let delivered = broker.publish(&topic_a, error_event("only a")).await;
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_are_idempotent() {
        let broker = NotificationBroker::new();
        let conn = ConnectionId::generate();
        let (tx, _rx) = mpsc::unbounded_channel();
        broker.register(conn, tx).await;

        let topic = Topic::category("medical");
        broker.subscribe(conn, topic.clone()).await;
        broker.subscribe(conn, topic.clone()).await;
        assert_eq!(broker.subscriber_count(&topic).await, 1);

        broker.unsubscribe(conn, &topic).await;
        broker.unsubscribe(conn, &topic).await;
        assert_eq!(broker.subscriber_count(&topic).await, 0);
    }

    #[tokio::test]
    async fn drop_connection_releases_all_subscriptions() {
        let broker = NotificationBroker::new();
        let conn = ConnectionId::generate();
        let (tx, _rx) = mpsc::unbounded_channel();
        broker.register(conn, tx).await;

        let chat = Topic::Chat(domain::ChatId::new(Uuid::new_v4()));
        broker.subscribe(conn, chat.clone()).await;
        broker.subscribe(conn, Topic::Global).await;

        let released = broker.drop_connection(conn).await;
        assert_eq!(released.len(), 2);
        assert_eq!(broker.subscriber_count(&chat).await, 0);
        assert_eq!(broker.subscriber_count(&Topic::Global).await, 0);
    }

    #[tokio::test]
    async fn closed_receiver_is_reaped_not_an_error() {
        let broker = NotificationBroker::new();
        let conn = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        broker.register(conn, tx).await;
        broker.subscribe(conn, Topic::Global).await;
        drop(rx);

        let delivered = broker.publish(&Topic::Global, error_event("gone")).await;
        assert_eq!(delivered, 0);
        assert_eq!(broker.subscriber_count(&Topic::Global).await, 0);
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let broker = NotificationBroker::new();
        let conn = ConnectionId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broker.register(conn, tx).await;
        broker.subscribe(conn, Topic::Global).await;

        for i in 0..10 {
            broker.publish(&Topic::Global, error_event(&i.to_string())).await;
        }
        for i in 0..10 {
            match rx.try_recv().expect("event") {
                ServerEvent::Error { message, .. } => assert_eq!(message, i.to_string()),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }
}
