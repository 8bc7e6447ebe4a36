use std::sync::Arc;

use domain::{
    DomainError, Message, MessageContent, MessageId, RepositoryError, RoomId, Timestamp, UserId,
};

use crate::{
    clock::Clock, dto::MessageDto, error::ApplicationError, repository::MessageRepository,
};

/// 新消息。调用方已经确认房间存在且作者已认证，时间戳由服务端时钟生成。
#[derive(Debug, Clone)]
pub struct CreateMessageRequest {
    pub content: MessageContent,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct UpdateMessageRequest {
    pub message_id: String,
    pub content: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct DeleteMessageRequest {
    pub message_id: String,
    pub user_id: UserId,
}

pub struct MessageLedgerDependencies {
    pub message_repository: Arc<dyn MessageRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 消息账本：创建、修改、删除消息并执行作者校验。
pub struct MessageLedger {
    deps: MessageLedgerDependencies,
}

impl MessageLedger {
    pub fn new(deps: MessageLedgerDependencies) -> Self {
        Self { deps }
    }

    pub async fn create_message(
        &self,
        request: CreateMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let message = Message::new(
            MessageId::generate(),
            request.room_id,
            request.user_id,
            request.content,
            request.created_at,
        );
        let stored = self.deps.message_repository.create(message).await?;
        Ok(MessageDto::from(&stored))
    }

    pub async fn update_message(
        &self,
        request: UpdateMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let mut message = self.find_message(&request.message_id).await?;
        let content = MessageContent::new(request.content)?;
        if !message.is_authored_by(request.user_id) {
            return Err(DomainError::NotMessageAuthor { action: "update" }.into());
        }

        message.edit(content, self.deps.clock.now());
        let stored = self
            .deps
            .message_repository
            .update(message)
            .await
            .map_err(missing_message)?;
        Ok(MessageDto::from(&stored))
    }

    /// 删除成功时返回被删除的消息，调用方据此决定广播到哪个房间。
    pub async fn delete_message(
        &self,
        request: DeleteMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let message_id = MessageId::parse(&request.message_id).ok_or(DomainError::MessageNotFound)?;
        let existing = self
            .deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound)?;
        if !existing.message.is_authored_by(request.user_id) {
            return Err(DomainError::NotMessageAuthor { action: "delete" }.into());
        }

        self.deps
            .message_repository
            .delete(message_id)
            .await
            .map_err(missing_message)?;
        Ok(MessageDto::from(&existing))
    }

    /// 房间历史的一个时间点快照，按创建时间升序。
    pub async fn room_history(&self, room_id: RoomId) -> Result<Vec<MessageDto>, ApplicationError> {
        let records = self.deps.message_repository.list_by_room(room_id).await?;
        Ok(records.iter().map(MessageDto::from).collect())
    }

    async fn find_message(&self, id: &str) -> Result<Message, ApplicationError> {
        let message_id = MessageId::parse(id).ok_or(DomainError::MessageNotFound)?;
        self.deps
            .message_repository
            .find_by_id(message_id)
            .await?
            .map(|hydrated| hydrated.message)
            .ok_or_else(|| DomainError::MessageNotFound.into())
    }
}

// 校验与写入之间消息被并发删除时，按不存在处理
fn missing_message(err: RepositoryError) -> ApplicationError {
    match err {
        RepositoryError::NotFound => DomainError::MessageNotFound.into(),
        other => other.into(),
    }
}
