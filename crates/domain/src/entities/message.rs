//! 消息实体
//!
//! 消息是每个聊天有序账本中的一条记录：序列号在聊天内严格递增且无空洞。
//! 已读标记与表情反应是消息上的可变覆盖层，唯一性不变量在实体的
//! 变更方法里强制，而不是留给调用方扫描数组。

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{ChatId, IdentityId, MessageId, Timestamp};

/// 消息内容
///
/// 文本与各类附件互斥，由枚举结构保证。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        content: String,
    },
    Voice {
        url: String,
        duration_secs: Option<u32>,
    },
    Image {
        url: String,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },
    ResourceShare {
        resource_id: Uuid,
        title: String,
    },
}

impl MessageContent {
    /// 校验内容负载，空文本或空附件地址视为参数非法
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            MessageContent::Text { content } if content.trim().is_empty() => Err(
                DomainError::invalid_argument("content", "message content must not be empty"),
            ),
            MessageContent::Voice { url, .. } | MessageContent::Image { url, .. }
                if url.is_empty() =>
            {
                Err(DomainError::invalid_argument(
                    "url",
                    "attachment url must not be empty",
                ))
            }
            MessageContent::ResourceShare { title, .. } if title.is_empty() => Err(
                DomainError::invalid_argument("title", "resource title must not be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// 用于最近消息摘要的短预览
    pub fn preview(&self) -> String {
        match self {
            MessageContent::Text { content } => content.chars().take(80).collect(),
            MessageContent::Voice { .. } => "[voice]".to_string(),
            MessageContent::Image { .. } => "[image]".to_string(),
            MessageContent::Location { .. } => "[location]".to_string(),
            MessageContent::ResourceShare { title, .. } => format!("[resource] {title}"),
        }
    }
}

/// 消息实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: IdentityId,
    /// 聊天内单调递增、无空洞的序列位置，编辑和删除都不改变它
    pub sequence: u64,
    pub content: MessageContent,
    pub reply_to: Option<MessageId>,
    /// 每个身份至多一个已读标记
    pub read_by: HashMap<IdentityId, Timestamp>,
    /// 每个身份的活跃反应集合，(身份, emoji) 至多一条
    pub reactions: HashMap<IdentityId, BTreeSet<String>>,
    /// 首次编辑时保留的原始内容
    pub original_content: Option<MessageContent>,
    pub edited_at: Option<Timestamp>,
    /// 软删除墓碑：从账本视图移除但不重排邻居的序列号
    pub deleted: bool,
    pub sent_at: Timestamp,
}

impl Message {
    pub fn new(
        chat_id: ChatId,
        sender: IdentityId,
        sequence: u64,
        content: MessageContent,
        reply_to: Option<MessageId>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            chat_id,
            sender,
            sequence,
            content,
            reply_to,
            read_by: HashMap::new(),
            reactions: HashMap::new(),
            original_content: None,
            edited_at: None,
            deleted: false,
            sent_at,
        }
    }

    /// 记录已读标记；重复标记是幂等的空操作，返回是否新增
    pub fn mark_read(&mut self, reader: IdentityId, at: Timestamp) -> bool {
        match self.read_by.entry(reader) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(at);
                true
            }
        }
    }

    /// 切换 (身份, emoji) 反应，返回切换后是否处于活跃状态
    pub fn toggle_reaction(&mut self, identity: IdentityId, emoji: &str) -> bool {
        let set = self.reactions.entry(identity).or_default();
        if set.remove(emoji) {
            if set.is_empty() {
                self.reactions.remove(&identity);
            }
            false
        } else {
            set.insert(emoji.to_string());
            true
        }
    }

    /// 应用编辑；仅首次编辑保留原始内容
    pub fn apply_edit(&mut self, new_content: MessageContent, at: Timestamp) {
        if self.original_content.is_none() {
            self.original_content = Some(self.content.clone());
        }
        self.content = new_content;
        self.edited_at = Some(at);
    }
}
