//! 领域模型错误定义

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field}: {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("username is already taken")]
    UserAlreadyExists,

    #[error("room not found")]
    RoomNotFound,

    #[error("a room with the same name already exists")]
    RoomNameTaken,

    #[error("message not found")]
    MessageNotFound,

    /// 只有消息作者可以修改或删除消息
    #[error("you are not allowed to {action} this message")]
    NotMessageAuthor { action: &'static str },

    /// 事件中声明的用户与连接握手时认证的用户不一致
    #[error("payload user does not match the authenticated session")]
    IdentityMismatch,
}

impl DomainError {
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 持久化层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    /// 唯一约束冲突
    #[error("record already exists")]
    Conflict,
    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
