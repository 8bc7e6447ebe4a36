//! Socket 事件的线上格式。
//!
//! 每一帧都是 `{"event": "<name>", "data": <payload>}`。入站事件在分发前
//! 被解析成带标签的枚举，解析失败即 `InvalidArgument`。

use std::fmt;

use domain::{DomainError, RoomId};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::dto::MessageDto;
use crate::error::{ApplicationError, ErrorKind};

/// 客户端在负载中声明的用户。握手身份才是权威来源，这里只用于一致性校验。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClaimedUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedRoom {
    pub room_id: String,
    #[serde(default)]
    pub user: Option<ClaimedUser>,
}

/// `join-room` / `leave-room` 的负载：裸房间 ID 或 `{roomId, user?}`。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RoomTarget {
    Id(String),
    Scoped(ScopedRoom),
}

impl RoomTarget {
    pub fn room_id(&self) -> &str {
        match self {
            RoomTarget::Id(id) => id,
            RoomTarget::Scoped(scoped) => &scoped.room_id,
        }
    }

    pub fn user(&self) -> Option<&ClaimedUser> {
        match self {
            RoomTarget::Id(_) => None,
            RoomTarget::Scoped(scoped) => scoped.user.as_ref(),
        }
    }
}

/// 客户端附带的其他字段（例如 `createdAt`）会被忽略，时间戳只由服务端生成。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: String,
    pub content: String,
    #[serde(default)]
    pub user: Option<ClaimedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessagePayload {
    pub message_id: String,
    pub content: String,
    pub room_id: String,
    #[serde(default)]
    pub user: Option<ClaimedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub user: Option<ClaimedUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomTarget),
    LeaveRoom(RoomTarget),
    SendMessage(SendMessagePayload),
    UpdateMessage(UpdateMessagePayload),
    DeleteMessage(DeleteMessagePayload),
}

impl ClientEvent {
    pub fn parse(frame: &str) -> Result<Self, DomainError> {
        serde_json::from_str(frame)
            .map_err(|err| DomainError::invalid_argument("payload", err.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join-room",
            ClientEvent::LeaveRoom(_) => "leave-room",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::UpdateMessage(_) => "update-message",
            ClientEvent::DeleteMessage(_) => "delete-message",
        }
    }
}

/// `user-joined` / `user-left` 的负载
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    pub user_id: String,
    pub username: String,
    pub room_id: String,
}

impl PresenceNotice {
    pub fn new(user: &AuthenticatedUser, room_id: RoomId) -> Self {
        Self {
            user_id: user.id.to_string(),
            username: user.username.as_str().to_owned(),
            room_id: room_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: ErrorKind,
}

impl From<&ApplicationError> for ErrorPayload {
    fn from(err: &ApplicationError) -> Self {
        Self {
            message: err.public_message(),
            code: err.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// 仅发给加入者
    RoomMessages(Vec<MessageDto>),
    NewMessage(MessageDto),
    MessageUpdated(MessageDto),
    MessageDeleted(String),
    UserJoined(PresenceNotice),
    UserLeft(PresenceNotice),
    /// 仅发给请求方，从不广播
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomMessages(_) => "room-messages",
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::MessageUpdated(_) => "message-updated",
            ServerEvent::MessageDeleted(_) => "message-deleted",
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
