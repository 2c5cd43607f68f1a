//! 消息账本
//!
//! 每个聊天一份有序、只追加的消息日志。同一聊天的全部变更操作
//! 在该聊天的互斥锁下串行化——序列号分配与发布发生在同一个临界区
//! 内，保证订阅者观察到的顺序与账本提交顺序一致；不同聊天之间
//! 完全并行。
//!
//! 结构性失败（NotFound / Forbidden / InvalidArgument / Conflict）
//! 都在任何状态被修改之前返回，操作对账本是原子的。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use domain::{
    Chat, ChatId, DomainError, DomainResult, IdentityId, LastMessage, Message, MessageContent,
    MessageId, MessageView, ServerEvent, Topic,
};

use crate::broker::NotificationBroker;
use crate::clock::Clock;
use crate::directory::{ChatStore, IdentityCache, MessageStore, PushHandoff};
use crate::error::{ApplicationError, ApplicationResult};
use crate::presence::PresenceRegistry;

/// 单个聊天的账本状态，整体在一把互斥锁之下
struct ChatLedger {
    chat: Chat,
    /// 下一个待分配的序列号，从 1 开始
    next_sequence: u64,
    messages: Vec<Message>,
}

impl ChatLedger {
    fn new(chat: Chat) -> Self {
        Self {
            chat,
            next_sequence: 1,
            messages: Vec::new(),
        }
    }

    /// 按 id 定位消息（含墓碑），不存在返回 NotFound
    fn position_of(&self, message_id: MessageId) -> DomainResult<usize> {
        self.messages
            .iter()
            .position(|message| message.id == message_id)
            .ok_or_else(|| DomainError::not_found("message", message_id))
    }

    /// 从幸存的尾部重算最近消息摘要；聊天清空则清除摘要
    fn recompute_last_message(&mut self) {
        self.chat.last_message = self
            .messages
            .iter()
            .rev()
            .find(|message| !message.deleted)
            .map(|message| LastMessage {
                message_id: message.id,
                sender: message.sender,
                preview: message.content.preview(),
                sent_at: message.sent_at,
            });
    }
}

pub struct LedgerDependencies {
    pub chat_store: Arc<dyn ChatStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub broker: Arc<NotificationBroker>,
    pub presence: Arc<PresenceRegistry>,
    pub push: Arc<dyn PushHandoff>,
    pub identities: Arc<IdentityCache>,
    pub clock: Arc<dyn Clock>,
}

pub struct MessageLedger {
    chats: RwLock<HashMap<ChatId, Arc<Mutex<ChatLedger>>>>,
    chat_store: Arc<dyn ChatStore>,
    message_store: Arc<dyn MessageStore>,
    broker: Arc<NotificationBroker>,
    presence: Arc<PresenceRegistry>,
    push: Arc<dyn PushHandoff>,
    identities: Arc<IdentityCache>,
    clock: Arc<dyn Clock>,
}

impl MessageLedger {
    pub fn new(deps: LedgerDependencies) -> Self {
        Self {
            chats: RwLock::new(HashMap::new()),
            chat_store: deps.chat_store,
            message_store: deps.message_store,
            broker: deps.broker,
            presence: deps.presence,
            push: deps.push,
            identities: deps.identities,
            clock: deps.clock,
        }
    }

    /// 取或惰性加载聊天账本；聊天不存在返回 NotFound
    async fn chat_handle(&self, chat_id: ChatId) -> ApplicationResult<Arc<Mutex<ChatLedger>>> {
        if let Some(handle) = self.chats.read().await.get(&chat_id) {
            return Ok(handle.clone());
        }

        let chat = self
            .chat_store
            .fetch_chat(chat_id)
            .await?
            .ok_or_else(|| DomainError::not_found("chat", chat_id))?;

        let mut chats = self.chats.write().await;
        // 并发加载时以先到者为准
        let handle = chats
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(ChatLedger::new(chat))))
            .clone();
        Ok(handle)
    }

    /// 在聊天文档上执行一个同步闭包（供成员管理等只碰文档的操作）
    pub async fn with_chat<T>(
        &self,
        chat_id: ChatId,
        f: impl FnOnce(&mut Chat) -> DomainResult<T>,
    ) -> ApplicationResult<T> {
        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;
        f(&mut ledger.chat).map_err(ApplicationError::from)
    }

    /// 追加一条消息
    ///
    /// 序列号在本聊天的临界区内分配：先通过全部校验并完成持久化，
    /// 才推进计数器并提交，保证无空洞。提交同时更新最近消息摘要、
    /// 累加其他参与者的未读计数，并在 `chat:<id>` 上重新发布。
    pub async fn append(
        &self,
        chat_id: ChatId,
        sender: IdentityId,
        content: MessageContent,
        reply_to: Option<MessageId>,
    ) -> ApplicationResult<MessageView> {
        content.validate()?;

        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;

        if !ledger.chat.is_participant(sender) {
            return Err(DomainError::forbidden("send message to this chat").into());
        }
        check_content_allowed(&ledger.chat, &content)?;

        let now = self.clock.now();
        let message = Message::new(
            chat_id,
            sender,
            ledger.next_sequence,
            content,
            reply_to,
            now,
        );

        // 持久化失败时账本状态不变，序列号不前进
        self.message_store.persist_message(&message).await?;

        ledger.next_sequence += 1;
        ledger.chat.last_message = Some(LastMessage {
            message_id: message.id,
            sender,
            preview: message.content.preview(),
            sent_at: now,
        });
        for participant in ledger.chat.participants.iter_mut() {
            if participant.identity != sender {
                participant.unread += 1;
            }
        }
        ledger.messages.push(message.clone());

        let sender_name = self.identities.display_name(sender).await;
        let view = MessageView::from_message(&message, sender_name);
        let event = ServerEvent::NewMessage {
            chat_id,
            message: view.clone(),
        };
        self.broker.publish(&Topic::Chat(chat_id), event.clone()).await;

        // 离线参与者转交外部推送服务做延迟投递
        for participant in &ledger.chat.participants {
            if participant.identity == sender || !participant.notifications_enabled {
                continue;
            }
            if !self.presence.is_online(participant.identity).await {
                self.push.enqueue(participant.identity, &event).await;
            }
        }

        tracing::debug!(
            chat_id = %chat_id,
            sender = %sender,
            sequence = view.sequence,
            "消息已提交并发布"
        );
        Ok(view)
    }

    /// 标记已读
    ///
    /// 给定 `message_id` 时只标记那一条（重复标记是幂等空操作）；
    /// 缺省时整聊已读并清零该读者的未读计数。已读回执广播给全部
    /// 订阅者，读者自己的连接忽略即可。
    pub async fn mark_read(
        &self,
        chat_id: ChatId,
        reader: IdentityId,
        message_id: Option<MessageId>,
    ) -> ApplicationResult<()> {
        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;

        if !ledger.chat.is_participant(reader) {
            return Err(DomainError::forbidden("mark messages read in this chat").into());
        }

        let now = self.clock.now();
        match message_id {
            Some(message_id) => {
                let position = ledger.position_of(message_id)?;
                if ledger.messages[position].deleted {
                    return Err(DomainError::not_found("message", message_id).into());
                }
                if !ledger.messages[position].mark_read(reader, now) {
                    // 已经读过，无需再广播
                    return Ok(());
                }
                self.message_store
                    .persist_update(&ledger.messages[position])
                    .await?;
            }
            None => {
                for message in ledger.messages.iter_mut() {
                    if !message.deleted {
                        message.mark_read(reader, now);
                    }
                }
                if let Some(participant) = ledger.chat.participant_mut(reader) {
                    participant.unread = 0;
                }
            }
        }

        self.broker
            .publish(
                &Topic::Chat(chat_id),
                ServerEvent::MessageRead {
                    chat_id,
                    message_id,
                    read_by: reader,
                    read_at: now,
                },
            )
            .await;
        Ok(())
    }

    /// 切换 (身份, emoji) 反应
    pub async fn react(
        &self,
        chat_id: ChatId,
        identity: IdentityId,
        message_id: MessageId,
        emoji: String,
    ) -> ApplicationResult<bool> {
        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;

        if !ledger.chat.is_participant(identity) {
            return Err(DomainError::forbidden("react in this chat").into());
        }
        let position = ledger.position_of(message_id)?;
        if ledger.messages[position].deleted {
            return Err(DomainError::not_found("message", message_id).into());
        }

        let active = ledger.messages[position].toggle_reaction(identity, &emoji);
        self.message_store
            .persist_update(&ledger.messages[position])
            .await?;

        self.broker
            .publish(
                &Topic::Chat(chat_id),
                ServerEvent::ReactionUpdated {
                    chat_id,
                    message_id,
                    identity,
                    emoji,
                    active,
                },
            )
            .await;
        Ok(active)
    }

    /// 编辑消息；仅原发送者可编辑，首次编辑保留原文
    pub async fn edit(
        &self,
        chat_id: ChatId,
        identity: IdentityId,
        message_id: MessageId,
        new_content: String,
    ) -> ApplicationResult<()> {
        if new_content.trim().is_empty() {
            return Err(
                DomainError::invalid_argument("new_content", "edited content must not be empty")
                    .into(),
            );
        }

        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;
        let position = ledger.position_of(message_id)?;

        if ledger.messages[position].deleted {
            // 编辑撞上删除
            return Err(DomainError::conflict("message was deleted").into());
        }
        if ledger.messages[position].sender != identity {
            return Err(DomainError::forbidden("edit another identity's message").into());
        }
        if !matches!(
            ledger.messages[position].content,
            MessageContent::Text { .. }
        ) {
            return Err(DomainError::invalid_argument(
                "new_content",
                "only text messages can be edited",
            )
            .into());
        }

        let now = self.clock.now();
        ledger.messages[position].apply_edit(
            MessageContent::Text {
                content: new_content.clone(),
            },
            now,
        );
        // 编辑过的消息若仍是最近一条，同步刷新摘要
        if ledger
            .chat
            .last_message
            .as_ref()
            .is_some_and(|last| last.message_id == message_id)
        {
            ledger.recompute_last_message();
        }
        self.message_store
            .persist_update(&ledger.messages[position])
            .await?;

        self.broker
            .publish(
                &Topic::Chat(chat_id),
                ServerEvent::MessageEdited {
                    chat_id,
                    message_id,
                    new_content,
                    edited_at: now,
                },
            )
            .await;
        Ok(())
    }

    /// 删除消息（软删除墓碑）
    ///
    /// 发送者本人或持有协管/管理角色的身份可删除；幸存消息的序列号
    /// 不重排。被删的是最近一条时从新的尾部重算摘要。
    pub async fn delete(
        &self,
        chat_id: ChatId,
        identity: IdentityId,
        message_id: MessageId,
    ) -> ApplicationResult<()> {
        let handle = self.chat_handle(chat_id).await?;
        let mut ledger = handle.lock().await;
        let position = ledger.position_of(message_id)?;

        if ledger.messages[position].deleted {
            return Err(DomainError::not_found("message", message_id).into());
        }

        let is_sender = ledger.messages[position].sender == identity;
        let chat_role_allows = ledger
            .chat
            .participant(identity)
            .map(|participant| participant.role.can_moderate())
            .unwrap_or(false);
        let global_role_allows = match self.identities.get(identity).await {
            Ok(profile) => profile.role.can_moderate(),
            Err(_) => false,
        };
        if !(is_sender || chat_role_allows || global_role_allows) {
            return Err(DomainError::forbidden("delete this message").into());
        }

        ledger.messages[position].deleted = true;
        if ledger
            .chat
            .last_message
            .as_ref()
            .is_some_and(|last| last.message_id == message_id)
        {
            ledger.recompute_last_message();
        }
        self.message_store
            .persist_update(&ledger.messages[position])
            .await?;

        self.broker
            .publish(
                &Topic::Chat(chat_id),
                ServerEvent::MessageDeleted {
                    chat_id,
                    message_id,
                    deleted_by: identity,
                },
            )
            .await;
        Ok(())
    }

    /// 当前摘要（测试与读侧查询用）
    pub async fn last_message(&self, chat_id: ChatId) -> ApplicationResult<Option<LastMessage>> {
        let handle = self.chat_handle(chat_id).await?;
        let ledger = handle.lock().await;
        Ok(ledger.chat.last_message.clone())
    }
}

/// 聊天设置对附件类型的开关
fn check_content_allowed(chat: &Chat, content: &MessageContent) -> DomainResult<()> {
    let allowed = match content {
        MessageContent::Voice { .. } => chat.settings.allow_voice,
        MessageContent::Image { .. } => chat.settings.allow_image,
        MessageContent::Location { .. } => chat.settings.allow_location,
        MessageContent::Text { .. } | MessageContent::ResourceShare { .. } => true,
    };
    if allowed {
        Ok(())
    } else {
        Err(DomainError::forbidden(
            "this attachment type is disabled in chat settings",
        ))
    }
}
