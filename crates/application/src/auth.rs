//! 认证相关端口：会话凭证校验与密码哈希。
//!
//! 两者都由外部协作方实现（JWT、bcrypt），应用层只依赖这里的 trait。

use async_trait::async_trait;
use domain::{PasswordHash, User, UserId, Username};
use thiserror::Error;

use crate::error::ApplicationError;

/// 握手时解析出的用户身份，在连接生命周期内保持不变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: Username,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// 校验 bearer 凭证（签名 token）并解析为用户身份。
    async fn verify(&self, credential: &str) -> Result<AuthenticatedUser, ApplicationError>;
}

#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("hash error: {0}")]
    Hash(String),
    #[error("verify error: {0}")]
    Verify(String),
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash(message.into())
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify(message.into())
    }
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}
