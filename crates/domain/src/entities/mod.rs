//! 核心实体定义

pub mod alert;
pub mod chat;
pub mod identity;
pub mod message;

pub use alert::*;
pub use chat::*;
pub use identity::*;
pub use message::*;
