//! 客户端/服务端事件目录
//!
//! 双向事件通道的线上格式：入站事件由客户端发起（`ClientEvent`），
//! 出站事件由服务端推送（`ServerEvent`）。全部以 `type` 字段打标签。

pub mod client;
pub mod server;

pub use client::ClientEvent;
pub use server::{AlertEvent, MessageView, ServerEvent};
