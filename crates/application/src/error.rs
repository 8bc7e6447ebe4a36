use domain::{DomainError, RepositoryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::PasswordHasherError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("{0}")]
    Authentication(String),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// 对外暴露的错误分类，socket `error` 事件和 HTTP 状态码都由它决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidArgument,
    Unauthenticated,
    Internal,
}

impl ApplicationError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApplicationError::Authentication(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::Domain(err) => match err {
                DomainError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
                DomainError::UserAlreadyExists | DomainError::RoomNameTaken => ErrorKind::Conflict,
                DomainError::RoomNotFound | DomainError::MessageNotFound => ErrorKind::NotFound,
                DomainError::NotMessageAuthor { .. } | DomainError::IdentityMismatch => {
                    ErrorKind::Forbidden
                }
            },
            ApplicationError::Repository(RepositoryError::NotFound) => ErrorKind::NotFound,
            ApplicationError::Repository(RepositoryError::Conflict) => ErrorKind::Conflict,
            ApplicationError::Repository(RepositoryError::Storage { .. }) => ErrorKind::Internal,
            ApplicationError::Password(_) | ApplicationError::Infrastructure(_) => {
                ErrorKind::Internal
            }
            ApplicationError::Authentication(_) => ErrorKind::Unauthenticated,
        }
    }

    /// 可以安全返回给客户端的错误描述，内部错误只给出通用文案。
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal server error".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Repository(value)
    }
}
