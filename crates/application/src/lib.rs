//! 应用层实现。
//!
//! 这里提供实时消息与通知分发子系统的核心组件：在线状态注册表、
//! 房间成员管理、消息账本、通知代理与警报分发器，以及对外部协作方
//! （身份目录、聊天/消息存储、推送转交）的抽象。

pub mod broker;
pub mod clock;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod ledger;
pub mod membership;
pub mod presence;


pub use broker::{EventSender, NotificationBroker};
pub use clock::{Clock, SystemClock};
pub use directory::{
    ChatStore, DirectoryError, IdentityCache, IdentityDirectory, MessageStore, PushHandoff,
};
pub use dispatcher::{AlertDispatcher, DispatcherDependencies};
pub use error::ApplicationError;
pub use ledger::{LedgerDependencies, MessageLedger};
pub use membership::{JoinOutcome, RoomMembershipManager};
pub use presence::{PresenceRegistry, PresenceTransition};
