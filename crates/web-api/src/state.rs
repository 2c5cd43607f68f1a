use std::sync::Arc;

use application::{
    AlertDispatcher, IdentityCache, MessageLedger, NotificationBroker, PresenceRegistry,
    RoomMembershipManager,
};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<NotificationBroker>,
    pub presence: Arc<PresenceRegistry>,
    pub membership: Arc<RoomMembershipManager>,
    pub ledger: Arc<MessageLedger>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub identities: Arc<IdentityCache>,
    pub jwt_service: Arc<JwtService>,
}
