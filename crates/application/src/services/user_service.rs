use std::sync::Arc;

use domain::{DomainError, RepositoryError, User, UserId, Username};

use crate::{
    auth::{AuthenticatedUser, PasswordHasher},
    clock::Clock,
    dto::UserDto,
    error::ApplicationError,
    repository::UserRepository,
};

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub clock: Arc<dyn Clock>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

const INVALID_CREDENTIALS: &str = "invalid credentials";

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<UserDto, ApplicationError> {
        let username = Username::parse(request.username)?;
        let password_len = request.password.chars().count();
        if !(6..=100).contains(&password_len) {
            return Err(DomainError::invalid_argument(
                "password",
                "must be between 6 and 100 characters",
            )
            .into());
        }

        if self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .is_some()
        {
            return Err(DomainError::UserAlreadyExists.into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let user = User::register(
            UserId::generate(),
            username,
            password_hash,
            self.deps.clock.now(),
        );

        let stored = match self.deps.user_repository.create(user).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => return Err(DomainError::UserAlreadyExists.into()),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(user_id = %stored.id, "user signed up");
        Ok(UserDto::from(&stored))
    }

    /// 未知用户与密码错误返回同样的错误，避免枚举用户名。
    pub async fn sign_in(&self, request: SignInRequest) -> Result<UserDto, ApplicationError> {
        let username = Username::parse(request.username)
            .map_err(|_| ApplicationError::unauthenticated(INVALID_CREDENTIALS))?;
        let user = self
            .deps
            .user_repository
            .find_by_username(&username)
            .await?
            .ok_or_else(|| ApplicationError::unauthenticated(INVALID_CREDENTIALS))?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            return Err(ApplicationError::unauthenticated(INVALID_CREDENTIALS));
        }

        Ok(UserDto::from(&user))
    }

    /// 根据 token 中的用户 ID 重新读取用户；用户已不存在时视为未认证。
    pub async fn resolve_identity(
        &self,
        user_id: UserId,
    ) -> Result<AuthenticatedUser, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(user_id)
            .await?
            .map(|user| AuthenticatedUser::from(&user))
            .ok_or_else(|| ApplicationError::unauthenticated("user not found"))
    }
}
