//! 持久化网关契约。
//!
//! 具体实现位于 infrastructure（内存版与 PostgreSQL 版）。

use async_trait::async_trait;
use domain::{
    HydratedMessage, Message, MessageId, RepositoryError, Room, RoomId, RoomName, User, UserId,
    Username,
};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 用户名重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: User) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &Username)
        -> Result<Option<User>, RepositoryError>;
}

#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// 房间名重复时返回 `RepositoryError::Conflict`
    async fn create(&self, room: Room) -> Result<Room, RepositoryError>;
    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError>;
    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError>;
    /// 按创建时间倒序
    async fn list(&self) -> Result<Vec<Room>, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: Message) -> Result<HydratedMessage, RepositoryError>;
    async fn find_by_id(&self, id: MessageId) -> Result<Option<HydratedMessage>, RepositoryError>;
    /// 按 `created_at` 升序，相同时间按写入顺序
    async fn list_by_room(&self, room_id: RoomId)
        -> Result<Vec<HydratedMessage>, RepositoryError>;
    async fn update(&self, message: Message) -> Result<HydratedMessage, RepositoryError>;
    /// 记录不存在时返回 `RepositoryError::NotFound`
    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError>;
}
