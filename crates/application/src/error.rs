use domain::DomainError;
use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("collaborator error: {0}")]
    Collaborator(#[from] DirectoryError),
}

impl ApplicationError {
    /// 稳定的错误种类名，用于出站 `error` 事件
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationError::Domain(err) => err.kind(),
            ApplicationError::Collaborator(_) => "collaborator_unavailable",
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
