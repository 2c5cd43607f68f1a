//! 实时消息与通知分发子系统的核心领域模型
//!
//! 包含身份、聊天、消息、警报等核心实体，广播主题（Topic），
//! 以及客户端/服务端的事件目录。本层不做任何 I/O。

pub mod entities;
pub mod errors;
pub mod events;
pub mod topic;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use topic::*;
pub use value_objects::*;
