//! 身份实体
//!
//! 身份归外部用户目录所有，核心只持有按 id 键入的在线缓存，
//! 在最后一个连接断开时失效。

use serde::{Deserialize, Serialize};

use crate::value_objects::IdentityId;

/// 身份角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Moderator,
    Admin,
}

impl Role {
    /// 是否具有协管权限（删除他人消息等）
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

/// 按通知渠道的开关偏好
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    pub emergency: bool,
    pub resources: bool,
    pub challenges: bool,
    pub milestones: bool,
    pub donations: bool,
    pub predictions: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            emergency: true,
            resources: true,
            challenges: true,
            milestones: true,
            donations: true,
            predictions: true,
        }
    }
}

/// 已验证的身份
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub display_name: String,
    pub role: Role,
    pub verified: bool,
    /// 捐赠者标记，捐赠活动警报按此定向
    pub is_donor: bool,
    pub preferred_language: String,
    pub preferences: NotificationPreferences,
}

impl Identity {
    pub fn new(id: IdentityId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role: Role::Member,
            verified: false,
            is_donor: false,
            preferred_language: "en".to_string(),
            preferences: NotificationPreferences::default(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn verified(mut self) -> Self {
        self.verified = true;
        self
    }

    pub fn donor(mut self) -> Self {
        self.is_donor = true;
        self
    }

    /// 紧急与 AI 预测类警报的发布门槛：管理员或已验证身份
    pub fn can_emit_priority_alerts(&self) -> bool {
        self.role == Role::Admin || self.verified
    }
}
