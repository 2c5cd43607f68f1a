//! 入站事件目录（客户端 → 服务端）

use serde::{Deserialize, Serialize};

use crate::entities::identity::NotificationPreferences;
use crate::entities::message::MessageContent;
use crate::entities::alert::Urgency;
use crate::value_objects::{ChatId, Coordinates, MessageId};

/// 客户端事件
///
/// 每个事件携带结构化负载，产生零个或多个出站事件。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinChat {
        chat_id: ChatId,
    },
    LeaveChat {
        chat_id: ChatId,
    },
    SendMessage {
        chat_id: ChatId,
        #[serde(flatten)]
        content: MessageContent,
        reply_to: Option<MessageId>,
    },
    /// `message_id` 缺省时表示整聊已读
    MarkAsRead {
        chat_id: ChatId,
        message_id: Option<MessageId>,
    },
    AddReaction {
        chat_id: ChatId,
        message_id: MessageId,
        emoji: String,
    },
    EditMessage {
        chat_id: ChatId,
        message_id: MessageId,
        new_content: String,
    },
    DeleteMessage {
        chat_id: ChatId,
        message_id: MessageId,
    },
    StartTyping {
        chat_id: ChatId,
    },
    StopTyping {
        chat_id: ChatId,
    },
    SubscribeLocationAlerts {
        coordinates: Coordinates,
        radius_m: f64,
    },
    SubscribeResourceAlerts {
        categories: Vec<String>,
    },
    SendEmergencyAlert {
        title: String,
        message: String,
        location: Option<Coordinates>,
        urgency: Urgency,
        category: Option<String>,
    },
    UpdateNotificationPreferences {
        preferences: NotificationPreferences,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn send_message_wire_format() {
        let raw = json!({
            "type": "send_message",
            "chat_id": Uuid::nil(),
            "message_type": "text",
            "content": "hello",
            "reply_to": null
        });
        let event: ClientEvent = serde_json::from_value(raw).expect("parse");
        match event {
            ClientEvent::SendMessage { content, .. } => {
                assert_eq!(
                    content,
                    MessageContent::Text {
                        content: "hello".to_string()
                    }
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn mark_as_read_without_message_id() {
        let raw = json!({ "type": "mark_as_read", "chat_id": Uuid::nil() });
        let event: ClientEvent = serde_json::from_value(raw).expect("parse");
        assert_eq!(
            event,
            ClientEvent::MarkAsRead {
                chat_id: ChatId::new(Uuid::nil()),
                message_id: None
            }
        );
    }
}
