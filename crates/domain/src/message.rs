use crate::user::User;
use crate::value_objects::{MessageContent, MessageId, RoomId, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: MessageContent,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        user_id: UserId,
        content: MessageContent,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            user_id,
            content,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_authored_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// 替换正文并推进 `updated_at`，`updated_at` 不会早于 `created_at`。
    pub fn edit(&mut self, content: MessageContent, now: Timestamp) {
        self.content = content;
        self.updated_at = now.max(self.created_at);
    }
}

/// 作者的公开身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub username: Username,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
        }
    }
}

/// 附带作者公开身份的消息，持久层读取时返回这种反范式记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydratedMessage {
    pub message: Message,
    pub author: Author,
}
