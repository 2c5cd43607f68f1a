//! 主应用程序入口
//!
//! 组装实时消息与通知分发子系统并启动 Axum 服务。
//! 身份目录、聊天/消息存储与推送转交默认使用内存协作方；
//! 生产部署时替换为真实子系统的适配器。

use std::sync::Arc;

use application::directory::memory::{
    MemoryChatStore, MemoryDirectory, MemoryMessageStore, MemoryPushHandoff,
};
use application::{
    AlertDispatcher, Clock, DispatcherDependencies, IdentityCache, LedgerDependencies,
    MessageLedger, NotificationBroker, PresenceRegistry, RoomMembershipManager, SystemClock,
};
use config::AppConfig;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env();

    // 协作方与核心组件装配
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let broker = Arc::new(NotificationBroker::new());
    let directory = Arc::new(MemoryDirectory::new());
    let chat_store = Arc::new(MemoryChatStore::new());
    let message_store = Arc::new(MemoryMessageStore::new());
    let push = Arc::new(MemoryPushHandoff::new());

    let identities = Arc::new(IdentityCache::new(directory.clone()));
    let presence = Arc::new(PresenceRegistry::new(broker.clone(), clock.clone()));
    let ledger = Arc::new(MessageLedger::new(LedgerDependencies {
        chat_store,
        message_store,
        broker: broker.clone(),
        presence: presence.clone(),
        push: push.clone(),
        identities: identities.clone(),
        clock: clock.clone(),
    }));
    let membership = Arc::new(RoomMembershipManager::new(
        broker.clone(),
        ledger.clone(),
        clock.clone(),
        config.geo.clone(),
    ));
    let dispatcher = Arc::new(AlertDispatcher::new(DispatcherDependencies {
        broker: broker.clone(),
        presence: presence.clone(),
        directory,
        identities: identities.clone(),
        push,
        clock,
        geo: config.geo.clone(),
        milestones: config.milestones.clone(),
    }));

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState {
        broker,
        presence,
        membership,
        ledger,
        dispatcher,
        identities,
        jwt_service,
    };

    // 启动 Web 服务器
    let app = router(state);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("消息分发服务启动在 http://{bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "无法监听关停信号");
        return;
    }
    tracing::info!("收到 ctrl-c，开始优雅关停");
}
