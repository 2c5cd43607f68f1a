//! 警报实体
//!
//! 警报是一次性的非聊天通知，按类别路由到若干主题后即完成——
//! 核心不保留投递账本（投递历史是外部协作方的事）。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{AlertId, Coordinates, IdentityId, Timestamp};

/// 紧急程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// 警报类别及其定向所需的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AlertKind {
    Emergency {
        location: Option<Coordinates>,
        category: Option<String>,
    },
    ResourceAvailable {
        resource_id: Uuid,
        category: String,
    },
    ChallengeInvitation {
        invited: Vec<IdentityId>,
    },
    MysteryDrop {
        location: Coordinates,
        radius_m: f64,
    },
    ImpactMilestone {
        value: u64,
    },
    HeroNomination {
        nominee: IdentityId,
    },
    DonationDrive {
        category: String,
    },
    AiPrediction {
        location: Coordinates,
        category: String,
    },
}

impl AlertKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlertKind::Emergency { .. } => "emergency",
            AlertKind::ResourceAvailable { .. } => "resource-available",
            AlertKind::ChallengeInvitation { .. } => "challenge-invitation",
            AlertKind::MysteryDrop { .. } => "mystery-drop",
            AlertKind::ImpactMilestone { .. } => "impact-milestone",
            AlertKind::HeroNomination { .. } => "hero-nomination",
            AlertKind::DonationDrive { .. } => "donation-drive",
            AlertKind::AiPrediction { .. } => "ai-prediction",
        }
    }

    /// 发布此类警报是否要求管理员或已验证身份
    pub fn requires_priority_emitter(&self) -> bool {
        matches!(
            self,
            AlertKind::Emergency { .. } | AlertKind::AiPrediction { .. }
        )
    }
}

/// 警报实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    #[serde(flatten)]
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub emitted_by: IdentityId,
    pub emitted_at: Timestamp,
}

impl Alert {
    pub fn new(
        kind: AlertKind,
        title: impl Into<String>,
        message: impl Into<String>,
        urgency: Urgency,
        emitted_by: IdentityId,
        emitted_at: Timestamp,
    ) -> Self {
        Self {
            id: AlertId::generate(),
            kind,
            title: title.into(),
            message: message.into(),
            urgency,
            emitted_by,
            emitted_at,
        }
    }
}
