//! 集成测试公共脚手架：内存协作方组装出完整路由

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    time::{sleep, timeout},
};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};

use application::directory::memory::{
    MemoryChatStore, MemoryDirectory, MemoryMessageStore, MemoryPushHandoff,
};
use application::{
    AlertDispatcher, Clock, DispatcherDependencies, IdentityCache, LedgerDependencies,
    MessageLedger, NotificationBroker, PresenceRegistry, RoomMembershipManager, SystemClock,
};
use config::{GeoConfig, MilestoneConfig};
use domain::{Chat, ChatId, ChatKind, Identity, IdentityId, Participant};
use web_api::{router, AppState, JwtConfig, JwtService};

pub struct TestApp {
    pub router: Router,
    pub jwt: Arc<JwtService>,
    pub directory: Arc<MemoryDirectory>,
    pub chat_store: Arc<MemoryChatStore>,
    pub push: Arc<MemoryPushHandoff>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn token_for(&self, identity: IdentityId) -> String {
        self.jwt.generate_token(identity).expect("token")
    }

    pub async fn seed_identity(&self, identity: Identity) {
        self.directory.add_identity(identity).await;
    }

    /// 预置一个参与者为给定身份集合的群聊
    pub async fn seed_group_chat(&self, chat_id: ChatId, members: &[IdentityId]) {
        let now = chrono::Utc::now();
        let participants = members
            .iter()
            .map(|identity| Participant::new(*identity, now))
            .collect();
        self.chat_store
            .add_chat(Chat::new(chat_id, ChatKind::Group, participants))
            .await;
    }
}

pub fn build_test_app() -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broker = Arc::new(NotificationBroker::new());
    let directory = Arc::new(MemoryDirectory::new());
    let chat_store = Arc::new(MemoryChatStore::new());
    let message_store = Arc::new(MemoryMessageStore::new());
    let push = Arc::new(MemoryPushHandoff::new());

    let identities = Arc::new(IdentityCache::new(directory.clone()));
    let presence = Arc::new(PresenceRegistry::new(broker.clone(), clock.clone()));
    let ledger = Arc::new(MessageLedger::new(LedgerDependencies {
        chat_store: chat_store.clone(),
        message_store: message_store.clone(),
        broker: broker.clone(),
        presence: presence.clone(),
        push: push.clone(),
        identities: identities.clone(),
        clock: clock.clone(),
    }));

    let geo = GeoConfig::default();
    let membership = Arc::new(RoomMembershipManager::new(
        broker.clone(),
        ledger.clone(),
        clock.clone(),
        geo.clone(),
    ));
    let dispatcher = Arc::new(AlertDispatcher::new(DispatcherDependencies {
        broker: broker.clone(),
        presence: presence.clone(),
        directory: directory.clone(),
        identities: identities.clone(),
        push: push.clone(),
        clock,
        geo,
        milestones: MilestoneConfig::default(),
    }));

    let jwt = Arc::new(JwtService::new(JwtConfig {
        secret: "test-secret-key".to_string(),
        expiration_hours: 24,
    }));

    let state = AppState {
        broker,
        presence,
        membership,
        ledger,
        dispatcher,
        identities,
        jwt_service: jwt.clone(),
    };

    TestApp {
        router: router(state),
        jwt,
        directory,
        chat_store,
        push,
    }
}

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 携带 token 建立 WebSocket 连接
#[allow(dead_code)]
pub async fn connect_ws(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/ws?token={token}");
    let (ws, _) = connect_async(url).await.expect("ws connect");
    ws
}

/// 接收下一个文本事件并解析为 JSON；心跳帧被跳过
#[allow(dead_code)]
pub async fn recv_event(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("event within deadline")
            .expect("stream open")
            .expect("frame");
        match frame {
            TungsteniteMessage::Text(text) => {
                return serde_json::from_str(&text).expect("json event")
            }
            TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// 在短窗口内尝试接收一个事件；静默则返回 None
#[allow(dead_code)]
pub async fn try_recv_event(ws: &mut WsClient, window: Duration) -> Option<serde_json::Value> {
    loop {
        let frame = timeout(window, ws.next()).await.ok()??.ok()?;
        match frame {
            TungsteniteMessage::Text(text) => {
                return Some(serde_json::from_str(&text).expect("json event"))
            }
            TungsteniteMessage::Ping(_) | TungsteniteMessage::Pong(_) => continue,
            _ => return None,
        }
    }
}

/// 跳过无关事件直到收到指定类型
#[allow(dead_code)]
pub async fn recv_event_of(ws: &mut WsClient, event_type: &str) -> serde_json::Value {
    loop {
        let event = recv_event(ws).await;
        if event["type"] == event_type {
            return event;
        }
    }
}

/// 发送一个客户端事件
#[allow(dead_code)]
pub async fn send_event(ws: &mut WsClient, event: &serde_json::Value) {
    ws.send(TungsteniteMessage::Text(event.to_string().into()))
        .await
        .expect("send event");
}

/// 把路由挂到临时端口上，返回地址与关停句柄
pub async fn serve(router: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    // 等待服务器启动
    sleep(Duration::from_millis(100)).await;
    (addr, shutdown_tx)
}
