use std::sync::Arc;

use domain::{DomainError, RepositoryError, Room, RoomId, RoomName};

use crate::{
    clock::Clock,
    dto::{MessageDto, RoomDto},
    error::ApplicationError,
    repository::{MessageRepository, RoomRepository},
};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub name: String,
}

pub struct RoomDirectoryDependencies {
    pub room_repository: Arc<dyn RoomRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 房间目录：解析房间标识、创建房间并保证名称唯一。
pub struct RoomDirectory {
    deps: RoomDirectoryDependencies,
}

impl RoomDirectory {
    pub fn new(deps: RoomDirectoryDependencies) -> Self {
        Self { deps }
    }

    /// 名称唯一性是先查后写，并发创建同名房间时依赖存储层唯一约束兜底，
    /// 两条路径都表现为 `RoomNameTaken`。
    pub async fn create_room(&self, request: CreateRoomRequest) -> Result<RoomDto, ApplicationError> {
        let name = RoomName::parse(request.name)?;

        if self
            .deps
            .room_repository
            .find_by_name(&name)
            .await?
            .is_some()
        {
            return Err(DomainError::RoomNameTaken.into());
        }

        let room = Room::new(RoomId::generate(), name, self.deps.clock.now());
        let stored = match self.deps.room_repository.create(room).await {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => return Err(DomainError::RoomNameTaken.into()),
            Err(err) => return Err(err.into()),
        };

        tracing::info!(room_id = %stored.id, name = %stored.name, "room created");
        Ok(RoomDto::new(&stored, Vec::new()))
    }

    /// 解析房间标识；格式错误的标识与不存在的房间一样返回 `RoomNotFound`。
    pub async fn resolve_room(&self, id: &str) -> Result<Room, ApplicationError> {
        let room_id = RoomId::parse(id).ok_or(DomainError::RoomNotFound)?;
        self.deps
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| DomainError::RoomNotFound.into())
    }

    pub async fn get_room_by_id(&self, id: &str) -> Result<RoomDto, ApplicationError> {
        let room = self.resolve_room(id).await?;
        let messages = self.room_messages(room.id).await?;
        Ok(RoomDto::new(&room, messages))
    }

    /// 所有房间，最新创建的在前，每个房间的消息按时间升序。
    pub async fn list_rooms(&self) -> Result<Vec<RoomDto>, ApplicationError> {
        let rooms = self.deps.room_repository.list().await?;
        let mut result = Vec::with_capacity(rooms.len());
        for room in &rooms {
            let messages = self.room_messages(room.id).await?;
            result.push(RoomDto::new(room, messages));
        }
        Ok(result)
    }

    async fn room_messages(&self, room_id: RoomId) -> Result<Vec<MessageDto>, ApplicationError> {
        let records = self.deps.message_repository.list_by_room(room_id).await?;
        Ok(records.iter().map(MessageDto::from).collect())
    }
}
