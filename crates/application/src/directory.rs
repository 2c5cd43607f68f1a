//! 外部协作方抽象
//!
//! 用户目录、资源目录与持久化存储都在本子系统之外；这里定义核心
//! 消费的操作，并提供内存实现供组装与测试使用。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use domain::{
    Chat, ChatId, DomainError, Identity, IdentityId, Message, NotificationPreferences, ServerEvent,
};

use crate::error::ApplicationError;

/// 协作方不可用错误
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// 外部用户目录
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// 按 id 取身份；不存在返回 None
    async fn fetch_identity(&self, id: IdentityId) -> Result<Option<Identity>, DirectoryError>;

    /// 捐赠者身份
    async fn donor_identities(&self) -> Result<Vec<IdentityId>, DirectoryError>;

    /// 曾对某资源表达兴趣的身份
    async fn interested_identities(
        &self,
        resource_id: Uuid,
    ) -> Result<Vec<IdentityId>, DirectoryError>;
}

/// 外部聊天目录，按 id 取聊天文档（含参与者列表）
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn fetch_chat(&self, id: ChatId) -> Result<Option<Chat>, DirectoryError>;
}

/// 持久化存储：消息及其覆盖层的落盘是外部协作方的职责
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn persist_message(&self, message: &Message) -> Result<(), DirectoryError>;
    async fn persist_update(&self, message: &Message) -> Result<(), DirectoryError>;
}

/// 离线转交：收件人不在线时，把事件交给外部推送服务做延迟投递
#[async_trait]
pub trait PushHandoff: Send + Sync {
    async fn enqueue(&self, identity: IdentityId, event: &ServerEvent);
}

/// 身份在线缓存
///
/// 核心只缓存当前有连接的身份，最后一个连接断开时失效；
/// 通知偏好的运行时更新落在这里。
pub struct IdentityCache {
    directory: Arc<dyn IdentityDirectory>,
    entries: RwLock<HashMap<IdentityId, Identity>>,
}

impl IdentityCache {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self {
            directory,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 认证成功后放入缓存
    pub async fn insert(&self, identity: Identity) {
        self.entries.write().await.insert(identity.id, identity);
    }

    /// 取身份：优先缓存，未命中回源目录
    pub async fn get(&self, id: IdentityId) -> Result<Identity, ApplicationError> {
        if let Some(identity) = self.entries.read().await.get(&id) {
            return Ok(identity.clone());
        }
        match self.directory.fetch_identity(id).await? {
            Some(identity) => Ok(identity),
            None => Err(DomainError::not_found("identity", id).into()),
        }
    }

    /// 解析显示名，失败时退回 id 字符串（读侧补全不应让发布失败）
    pub async fn display_name(&self, id: IdentityId) -> String {
        match self.get(id).await {
            Ok(identity) => identity.display_name,
            Err(_) => id.to_string(),
        }
    }

    pub async fn update_preferences(&self, id: IdentityId, preferences: NotificationPreferences) {
        if let Some(identity) = self.entries.write().await.get_mut(&id) {
            identity.preferences = preferences;
        }
    }

    /// 最后一个连接断开时失效
    pub async fn invalidate(&self, id: IdentityId) {
        self.entries.write().await.remove(&id);
    }
}

/// 内存实现的协作方（用于组装与测试）
pub mod memory {
    use super::*;

    #[derive(Default)]
    pub struct MemoryDirectory {
        identities: RwLock<HashMap<IdentityId, Identity>>,
        interests: RwLock<HashMap<Uuid, Vec<IdentityId>>>,
    }

    impl MemoryDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_identity(&self, identity: Identity) {
            self.identities.write().await.insert(identity.id, identity);
        }

        pub async fn add_interest(&self, resource_id: Uuid, identity: IdentityId) {
            self.interests
                .write()
                .await
                .entry(resource_id)
                .or_default()
                .push(identity);
        }
    }

    #[async_trait]
    impl IdentityDirectory for MemoryDirectory {
        async fn fetch_identity(
            &self,
            id: IdentityId,
        ) -> Result<Option<Identity>, DirectoryError> {
            Ok(self.identities.read().await.get(&id).cloned())
        }

        async fn donor_identities(&self) -> Result<Vec<IdentityId>, DirectoryError> {
            let identities = self.identities.read().await;
            Ok(identities
                .values()
                .filter(|identity| identity.is_donor)
                .map(|identity| identity.id)
                .collect())
        }

        async fn interested_identities(
            &self,
            resource_id: Uuid,
        ) -> Result<Vec<IdentityId>, DirectoryError> {
            Ok(self
                .interests
                .read()
                .await
                .get(&resource_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    #[derive(Default)]
    pub struct MemoryChatStore {
        chats: RwLock<HashMap<ChatId, Chat>>,
    }

    impl MemoryChatStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_chat(&self, chat: Chat) {
            self.chats.write().await.insert(chat.id, chat);
        }
    }

    #[async_trait]
    impl ChatStore for MemoryChatStore {
        async fn fetch_chat(&self, id: ChatId) -> Result<Option<Chat>, DirectoryError> {
            Ok(self.chats.read().await.get(&id).cloned())
        }
    }

    #[derive(Default)]
    pub struct MemoryMessageStore {
        persisted: RwLock<Vec<Message>>,
    }

    impl MemoryMessageStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn persisted_count(&self) -> usize {
            self.persisted.read().await.len()
        }
    }

    #[async_trait]
    impl MessageStore for MemoryMessageStore {
        async fn persist_message(&self, message: &Message) -> Result<(), DirectoryError> {
            self.persisted.write().await.push(message.clone());
            Ok(())
        }

        async fn persist_update(&self, message: &Message) -> Result<(), DirectoryError> {
            let mut persisted = self.persisted.write().await;
            if let Some(existing) = persisted.iter_mut().find(|m| m.id == message.id) {
                *existing = message.clone();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct MemoryPushHandoff {
        recorded: RwLock<Vec<(IdentityId, String)>>,
    }

    impl MemoryPushHandoff {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn recorded(&self) -> Vec<(IdentityId, String)> {
            self.recorded.read().await.clone()
        }
    }

    #[async_trait]
    impl PushHandoff for MemoryPushHandoff {
        async fn enqueue(&self, identity: IdentityId, event: &ServerEvent) {
            self.recorded
                .write()
                .await
                .push((identity, event.name().to_string()));
        }
    }
}
