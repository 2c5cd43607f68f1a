//! 警报分发器
//!
//! 通知代理之上的策略层：按警报类别计算它必须到达的主题集合，
//! 施加授权门槛，然后逐一发布。被拒绝的警报不会发布到任何主题。
//! 警报是一次性的（fire-and-forget），核心不保留投递账本。

use std::sync::Arc;

use config::{GeoConfig, MilestoneConfig};
use domain::{
    Alert, AlertEvent, AlertKind, DomainError, GeoCell, IdentityId, NotificationPreferences,
    ServerEvent, Topic, Urgency,
};

use crate::broker::NotificationBroker;
use crate::clock::Clock;
use crate::directory::{IdentityCache, IdentityDirectory, PushHandoff};
use crate::error::ApplicationResult;
use crate::presence::PresenceRegistry;

/// 紧急与 AI 预测警报没有显式半径，按这个覆盖半径展开地理分桶。
const PRIORITY_ALERT_RADIUS_M: f64 = 10_000.0;

pub struct DispatcherDependencies {
    pub broker: Arc<NotificationBroker>,
    pub presence: Arc<PresenceRegistry>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub identities: Arc<IdentityCache>,
    pub push: Arc<dyn PushHandoff>,
    pub clock: Arc<dyn Clock>,
    pub geo: GeoConfig,
    pub milestones: MilestoneConfig,
}

pub struct AlertDispatcher {
    broker: Arc<NotificationBroker>,
    presence: Arc<PresenceRegistry>,
    directory: Arc<dyn IdentityDirectory>,
    identities: Arc<IdentityCache>,
    push: Arc<dyn PushHandoff>,
    clock: Arc<dyn Clock>,
    geo: GeoConfig,
    milestones: MilestoneConfig,
}

impl AlertDispatcher {
    pub fn new(deps: DispatcherDependencies) -> Self {
        Self {
            broker: deps.broker,
            presence: deps.presence,
            directory: deps.directory,
            identities: deps.identities,
            push: deps.push,
            clock: deps.clock,
            geo: deps.geo,
            milestones: deps.milestones,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// 分发一条警报，返回实际发布到的主题
    ///
    /// 授权门槛在任何发布之前检查：紧急与 AI 预测要求发布者是
    /// 管理员或已验证身份，不满足时以 Forbidden 整体拒绝。
    pub async fn dispatch(&self, alert: Alert) -> ApplicationResult<Vec<Topic>> {
        let emitter = self.identities.get(alert.emitted_by).await?;
        if alert.kind.requires_priority_emitter() && !emitter.can_emit_priority_alerts() {
            tracing::warn!(
                emitter = %emitter.id,
                kind = alert.kind.name(),
                "警报被授权门槛拒绝"
            );
            return Err(DomainError::forbidden(format!(
                "emit {} alerts",
                alert.kind.name()
            ))
            .into());
        }

        let view = AlertEvent::from(&alert);
        let mut pairs: Vec<(Topic, ServerEvent)> = Vec::new();

        match &alert.kind {
            AlertKind::Emergency { location, category } => {
                let event = ServerEvent::EmergencyAlert {
                    alert: view.clone(),
                };
                if let Some(location) = location {
                    for cell in
                        GeoCell::covering(*location, PRIORITY_ALERT_RADIUS_M, self.geo.cell_size_deg)
                    {
                        pairs.push((Topic::GeoBucket(cell), event.clone()));
                    }
                }
                if let Some(category) = category {
                    pairs.push((Topic::category(category.clone()), event.clone()));
                }
                if alert.urgency == Urgency::Critical {
                    pairs.push((
                        Topic::Global,
                        ServerEvent::CriticalEmergencyAlert { alert: view },
                    ));
                }
            }
            AlertKind::ResourceAvailable {
                resource_id,
                category,
            } => {
                let event = ServerEvent::ResourceNotification { alert: view };
                pairs.push((Topic::category(category.clone()), event.clone()));
                for identity in self.directory.interested_identities(*resource_id).await? {
                    self.add_user_target(&mut pairs, identity, event.clone())
                        .await;
                }
            }
            AlertKind::ChallengeInvitation { invited } => {
                let event = ServerEvent::ChallengeInvitation { alert: view };
                for identity in invited {
                    self.add_user_target(&mut pairs, *identity, event.clone())
                        .await;
                }
            }
            AlertKind::MysteryDrop { location, radius_m } => {
                GeoCell::validate_radius(*radius_m, self.geo.max_radius_m)?;
                let event = ServerEvent::MysteryDropAlert { alert: view };
                for cell in GeoCell::covering(*location, *radius_m, self.geo.cell_size_deg) {
                    pairs.push((Topic::GeoBucket(cell), event.clone()));
                }
            }
            AlertKind::ImpactMilestone { value } => {
                let event = ServerEvent::ImpactMilestone {
                    alert: view.clone(),
                };
                self.add_user_target(&mut pairs, alert.emitted_by, event)
                    .await;
                if self.milestones.is_community_milestone(*value) {
                    pairs.push((Topic::Global, ServerEvent::CommunityMilestone { alert: view }));
                }
            }
            AlertKind::HeroNomination { nominee } => {
                let event = ServerEvent::HeroNomination { alert: view };
                self.add_user_target(&mut pairs, *nominee, event).await;
            }
            AlertKind::DonationDrive { category } => {
                let event = ServerEvent::DonationDriveAlert { alert: view };
                pairs.push((Topic::category(category.clone()), event.clone()));
                if alert.urgency >= Urgency::High {
                    for identity in self.directory.donor_identities().await? {
                        self.add_user_target(&mut pairs, identity, event.clone())
                            .await;
                    }
                }
            }
            AlertKind::AiPrediction { location, category } => {
                let event = ServerEvent::AiPredictionAlert { alert: view };
                for cell in
                    GeoCell::covering(*location, PRIORITY_ALERT_RADIUS_M, self.geo.cell_size_deg)
                {
                    pairs.push((Topic::GeoBucket(cell), event.clone()));
                }
                pairs.push((Topic::category(category.clone()), event));
            }
        }

        let mut published = Vec::with_capacity(pairs.len());
        for (topic, event) in pairs {
            self.broker.publish(&topic, event).await;
            published.push(topic);
        }
        tracing::info!(
            alert_id = %alert.id,
            kind = alert.kind.name(),
            topic_count = published.len(),
            "警报已分发"
        );
        Ok(published)
    }

    /// 追加一个个人收件箱目标
    ///
    /// 该身份的通知偏好关掉对应渠道时跳过；不在线时转交推送服务。
    async fn add_user_target(
        &self,
        pairs: &mut Vec<(Topic, ServerEvent)>,
        identity: IdentityId,
        event: ServerEvent,
    ) {
        let preferences = match self.identities.get(identity).await {
            Ok(profile) => profile.preferences,
            Err(_) => NotificationPreferences::default(),
        };
        if !channel_enabled(&preferences, &event) {
            return;
        }
        if !self.presence.is_online(identity).await {
            self.push.enqueue(identity, &event).await;
        }
        pairs.push((Topic::User(identity), event));
    }
}

/// 通知偏好对出站警报事件的渠道开关
fn channel_enabled(preferences: &NotificationPreferences, event: &ServerEvent) -> bool {
    match event {
        ServerEvent::EmergencyAlert { .. } | ServerEvent::CriticalEmergencyAlert { .. } => {
            preferences.emergency
        }
        ServerEvent::ResourceNotification { .. } => preferences.resources,
        ServerEvent::ChallengeInvitation { .. } => preferences.challenges,
        ServerEvent::ImpactMilestone { .. }
        | ServerEvent::CommunityMilestone { .. }
        | ServerEvent::HeroNomination { .. } => preferences.milestones,
        ServerEvent::DonationDriveAlert { .. } => preferences.donations,
        ServerEvent::AiPredictionAlert { .. } => preferences.predictions,
        _ => true,
    }
}
