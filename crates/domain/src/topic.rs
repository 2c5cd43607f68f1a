//! 广播主题
//!
//! Topic 是 pub/sub 扇出的单位：连接订阅若干主题，事件发布到主题上。
//! 主题本身没有持久状态，订阅关系在重连时重建。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, GeoCell, IdentityId};

/// 逻辑广播通道
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// 单个聊天的房间主题，仅参与者可订阅
    Chat(ChatId),
    /// 每个身份的个人收件箱，连接认证后自动订阅
    User(IdentityId),
    /// 按资源类别的兴趣主题
    Category(String),
    /// 地理分桶主题，用于位置范围内的警报
    GeoBucket(GeoCell),
    /// 全局广播
    Global,
}

impl Topic {
    pub fn category(name: impl Into<String>) -> Self {
        Self::Category(name.into())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Chat(id) => write!(f, "chat:{id}"),
            Topic::User(id) => write!(f, "user:{id}"),
            Topic::Category(name) => write!(f, "category:{name}"),
            Topic::GeoBucket(cell) => write!(f, "geo-bucket:{cell}"),
            Topic::Global => write!(f, "broadcast:global"),
        }
    }
}
