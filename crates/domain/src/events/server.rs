//! 出站事件目录（服务端 → 客户端）

use serde::{Deserialize, Serialize};

use crate::entities::alert::{Alert, AlertKind, Urgency};
use crate::entities::message::{Message, MessageContent};
use crate::value_objects::{AlertId, ChatId, IdentityId, MessageId, Timestamp};

/// 消息的读侧视图
///
/// 发送者显示名在发布时通过身份目录补全，账本本身不存个人资料字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: IdentityId,
    pub sender_name: String,
    pub sequence: u64,
    #[serde(flatten)]
    pub content: MessageContent,
    pub reply_to: Option<MessageId>,
    pub sent_at: Timestamp,
}

impl MessageView {
    pub fn from_message(message: &Message, sender_name: impl Into<String>) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            sender: message.sender,
            sender_name: sender_name.into(),
            sequence: message.sequence,
            content: message.content.clone(),
            reply_to: message.reply_to,
            sent_at: message.sent_at,
        }
    }
}

/// 警报的出站视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: AlertId,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub emitted_by: IdentityId,
    pub emitted_at: Timestamp,
}

impl From<&Alert> for AlertEvent {
    fn from(alert: &Alert) -> Self {
        Self {
            id: alert.id,
            kind: alert.kind.clone(),
            title: alert.title.clone(),
            message: alert.message.clone(),
            urgency: alert.urgency,
            emitted_by: alert.emitted_by,
            emitted_at: alert.emitted_at,
        }
    }
}

/// 服务端事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    JoinedChat {
        chat_id: ChatId,
        participant_count: usize,
        unread: u64,
    },
    LeftChat {
        chat_id: ChatId,
    },
    NewMessage {
        chat_id: ChatId,
        message: MessageView,
    },
    MessageRead {
        chat_id: ChatId,
        /// 缺省表示整聊已读
        message_id: Option<MessageId>,
        read_by: IdentityId,
        read_at: Timestamp,
    },
    ReactionUpdated {
        chat_id: ChatId,
        message_id: MessageId,
        identity: IdentityId,
        emoji: String,
        active: bool,
    },
    MessageEdited {
        chat_id: ChatId,
        message_id: MessageId,
        new_content: String,
        edited_at: Timestamp,
    },
    MessageDeleted {
        chat_id: ChatId,
        message_id: MessageId,
        deleted_by: IdentityId,
    },
    UserTyping {
        chat_id: ChatId,
        identity: IdentityId,
    },
    UserStoppedTyping {
        chat_id: ChatId,
        identity: IdentityId,
    },
    UserOnline {
        identity: IdentityId,
    },
    UserOffline {
        identity: IdentityId,
        last_active: Timestamp,
    },
    EmergencyAlert {
        alert: AlertEvent,
    },
    CriticalEmergencyAlert {
        alert: AlertEvent,
    },
    ResourceNotification {
        alert: AlertEvent,
    },
    ChallengeInvitation {
        alert: AlertEvent,
    },
    MysteryDropAlert {
        alert: AlertEvent,
    },
    ImpactMilestone {
        alert: AlertEvent,
    },
    CommunityMilestone {
        alert: AlertEvent,
    },
    HeroNomination {
        alert: AlertEvent,
    },
    DonationDriveAlert {
        alert: AlertEvent,
    },
    AiPredictionAlert {
        alert: AlertEvent,
    },
    Error {
        kind: String,
        message: String,
    },
}

impl ServerEvent {
    /// 事件类型名，用于日志与离线转交记录
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JoinedChat { .. } => "joined_chat",
            ServerEvent::LeftChat { .. } => "left_chat",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::MessageRead { .. } => "message_read",
            ServerEvent::ReactionUpdated { .. } => "reaction_updated",
            ServerEvent::MessageEdited { .. } => "message_edited",
            ServerEvent::MessageDeleted { .. } => "message_deleted",
            ServerEvent::UserTyping { .. } => "user_typing",
            ServerEvent::UserStoppedTyping { .. } => "user_stopped_typing",
            ServerEvent::UserOnline { .. } => "user_online",
            ServerEvent::UserOffline { .. } => "user_offline",
            ServerEvent::EmergencyAlert { .. } => "emergency_alert",
            ServerEvent::CriticalEmergencyAlert { .. } => "critical_emergency_alert",
            ServerEvent::ResourceNotification { .. } => "resource_notification",
            ServerEvent::ChallengeInvitation { .. } => "challenge_invitation",
            ServerEvent::MysteryDropAlert { .. } => "mystery_drop_alert",
            ServerEvent::ImpactMilestone { .. } => "impact_milestone",
            ServerEvent::CommunityMilestone { .. } => "community_milestone",
            ServerEvent::HeroNomination { .. } => "hero_nomination",
            ServerEvent::DonationDriveAlert { .. } => "donation_drive_alert",
            ServerEvent::AiPredictionAlert { .. } => "ai_prediction_alert",
            ServerEvent::Error { .. } => "error",
        }
    }
}
