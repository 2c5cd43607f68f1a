//! 领域错误定义
//!
//! 与规格一致的错误分类：未认证、无权限、不存在、参数非法、结构冲突。
//! 所有错误都是终态的，调用方收到错误时领域状态未被修改。

use thiserror::Error;

/// 领域错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 凭证缺失或无效，连接级终态错误
    #[error("unauthenticated")]
    Unauthenticated,

    /// 已认证但对目标聊天/主题/动作无权限
    #[error("forbidden: {action}")]
    Forbidden { action: String },

    /// 引用的聊天/消息/身份不存在
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// 负载格式非法（例如空消息）
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// 同一消息上的并发结构冲突（例如编辑撞上删除）
    #[error("conflict: {reason}")]
    Conflict { reason: String },
}

impl DomainError {
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// 稳定的错误种类名，用于 `error` 事件的 `kind` 字段
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Unauthenticated => "unauthenticated",
            DomainError::Forbidden { .. } => "forbidden",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidArgument { .. } => "invalid_argument",
            DomainError::Conflict { .. } => "conflict",
        }
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
