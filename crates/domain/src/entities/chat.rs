//! 聊天实体
//!
//! 参与者列表是固定成员制：只能通过显式的增删操作变化。
//! 核心维护每个参与者的未读计数和最近消息摘要（反规范化）。

use serde::{Deserialize, Serialize};

use crate::entities::identity::Role;
use crate::value_objects::{ChatId, IdentityId, MessageId, Timestamp};

/// 聊天类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Direct,
    Group,
    ResourceLinked,
    ChallengeLinked,
}

/// 聊天级开关设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub allow_voice: bool,
    pub allow_image: bool,
    pub allow_location: bool,
    pub auto_translate: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            allow_voice: true,
            allow_image: true,
            allow_location: true,
            auto_translate: false,
        }
    }
}

/// 聊天参与者
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: IdentityId,
    pub role: Role,
    pub joined_at: Timestamp,
    pub last_seen: Option<Timestamp>,
    /// 该参与者对这个聊天的通知开关
    pub notifications_enabled: bool,
    /// 未读消息计数
    pub unread: u64,
}

impl Participant {
    pub fn new(identity: IdentityId, joined_at: Timestamp) -> Self {
        Self {
            identity,
            role: Role::Member,
            joined_at,
            last_seen: None,
            notifications_enabled: true,
            unread: 0,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// 聊天的最近消息摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: MessageId,
    pub sender: IdentityId,
    pub preview: String,
    pub sent_at: Timestamp,
}

/// 聊天实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    pub participants: Vec<Participant>,
    pub settings: ChatSettings,
    pub last_message: Option<LastMessage>,
}

impl Chat {
    pub fn new(id: ChatId, kind: ChatKind, participants: Vec<Participant>) -> Self {
        Self {
            id,
            kind,
            participants,
            settings: ChatSettings::default(),
            last_message: None,
        }
    }

    pub fn is_participant(&self, identity: IdentityId) -> bool {
        self.participants.iter().any(|p| p.identity == identity)
    }

    pub fn participant(&self, identity: IdentityId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn participant_mut(&mut self, identity: IdentityId) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.identity == identity)
    }
}
