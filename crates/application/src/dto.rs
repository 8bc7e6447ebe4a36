use domain::{Author, HydratedMessage, Room, Timestamp, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户的公开信息，不包含密码哈希。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: Uuid::from(user.id),
            username: user.username.as_str().to_owned(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDto {
    pub id: Uuid,
    pub username: String,
}

impl From<&Author> for AuthorDto {
    fn from(author: &Author) -> Self {
        Self {
            id: Uuid::from(author.id),
            username: author.username.as_str().to_owned(),
        }
    }
}

/// 水合后的消息，广播和历史记录都使用这个结构。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub content: String,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub user: AuthorDto,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: Timestamp,
}

impl From<&HydratedMessage> for MessageDto {
    fn from(hydrated: &HydratedMessage) -> Self {
        let message = &hydrated.message;
        Self {
            id: Uuid::from(message.id),
            content: message.content.as_str().to_owned(),
            room_id: Uuid::from(message.room_id),
            user_id: Uuid::from(message.user_id),
            user: AuthorDto::from(&hydrated.author),
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDto {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: Timestamp,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: Timestamp,
    pub messages: Vec<MessageDto>,
}

impl RoomDto {
    pub fn new(room: &Room, messages: Vec<MessageDto>) -> Self {
        Self {
            id: Uuid::from(room.id),
            name: room.name.as_str().to_owned(),
            created_at: room.created_at,
            updated_at: room.updated_at,
            messages,
        }
    }
}
