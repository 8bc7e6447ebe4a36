use std::sync::Arc;

use domain::{DomainError, MessageContent, RoomId};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    auth::{AuthenticatedUser, SessionAuthenticator},
    clock::Clock,
    error::{ApplicationError, ErrorKind},
    realtime::{
        events::{
            ClaimedUser, ClientEvent, DeleteMessagePayload, ErrorPayload, RoomTarget,
            SendMessagePayload, ServerEvent, UpdateMessagePayload,
        },
        registry::{ConnectionId, SubscriberRegistry, OUTBOX_CAPACITY},
    },
    services::{
        CreateMessageRequest, DeleteMessageRequest, MessageLedger, RoomDirectory,
        UpdateMessageRequest,
    },
};

pub struct RealtimeCoordinatorDependencies {
    pub room_directory: Arc<RoomDirectory>,
    pub message_ledger: Arc<MessageLedger>,
    pub authenticator: Arc<dyn SessionAuthenticator>,
    pub clock: Arc<dyn Clock>,
}

/// 握手后固定下来的连接上下文
#[derive(Debug, Clone)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub identity: Option<AuthenticatedUser>,
}

/// 一条已注册的实时连接，`events` 是发往该连接的事件流。
pub struct Connection {
    pub session: Session,
    pub events: mpsc::Receiver<Arc<ServerEvent>>,
}

/// 实时协调器
///
/// 管理连接与房间订阅的生命周期，把客户端事件转换为经过授权并已持久化的
/// 状态变更，再把规范化结果广播给房间订阅者。每个处理函数自行捕获错误并
/// 只向请求方发送 `error` 事件，协调器本身从不因单个事件失败而中断。
pub struct RealtimeCoordinator {
    deps: RealtimeCoordinatorDependencies,
    registry: SubscriberRegistry,
}

impl RealtimeCoordinator {
    pub fn new(deps: RealtimeCoordinatorDependencies) -> Self {
        Self {
            deps,
            registry: SubscriberRegistry::new(),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// 注册新连接。凭证只在这里校验一次；校验失败不会关闭连接，
    /// 但连接无法进行任何需要身份的房间操作。
    pub async fn connect(&self, credential: Option<&str>) -> Connection {
        let connection_id = ConnectionId::generate();
        let identity = match credential {
            Some(token) => match self.deps.authenticator.verify(token).await {
                Ok(user) => Some(user),
                Err(err) => {
                    tracing::warn!(%connection_id, error = %err, "socket handshake authentication failed");
                    None
                }
            },
            None => None,
        };

        let (outbox, events) = mpsc::channel(OUTBOX_CAPACITY);
        self.registry
            .register(connection_id, identity.clone(), outbox)
            .await;

        match &identity {
            Some(user) => {
                tracing::info!(%connection_id, user_id = %user.id, "connection authenticated")
            }
            None => tracing::info!(%connection_id, "anonymous connection registered"),
        }

        Connection {
            session: Session {
                connection_id,
                identity,
            },
            events,
        }
    }

    /// 解析并处理一帧原始文本
    pub async fn dispatch(&self, session: &Session, frame: &str) {
        match ClientEvent::parse(frame) {
            Ok(event) => self.handle(session, event).await,
            Err(err) => {
                self.reject(session, "unknown", ApplicationError::from(err))
                    .await
            }
        }
    }

    pub async fn handle(&self, session: &Session, event: ClientEvent) {
        let name = event.name();
        let result = match event {
            ClientEvent::JoinRoom(target) => self.join(session, target).await,
            ClientEvent::LeaveRoom(target) => self.leave(session, target).await,
            ClientEvent::SendMessage(payload) => self.send(session, payload).await,
            ClientEvent::UpdateMessage(payload) => self.update(session, payload).await,
            ClientEvent::DeleteMessage(payload) => self.delete(session, payload).await,
        };
        if let Err(err) = result {
            self.reject(session, name, err).await;
        }
    }

    /// 注销连接并通知其所在房间的其余订阅者。仍在执行中的操作会继续
    /// 完成并广播，只是不再投递给已离开的连接。
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some(last) = self.registry.unregister(connection_id).await else {
            return;
        };
        tracing::info!(%connection_id, room_id = ?last.room, "connection closed");
    }

    async fn join(&self, session: &Session, target: RoomTarget) -> Result<(), ApplicationError> {
        let user = require_identity(session, target.user())?;
        let room = self
            .deps
            .room_directory
            .resolve_room(target.room_id())
            .await?;
        let connection_id = session.connection_id;

        let Some(outcome) = self.registry.subscribe(connection_id, room.id).await else {
            return Ok(());
        };
        if let Some(previous) = outcome.previous {
            tracing::info!(%connection_id, user_id = %user.id, room_id = %previous, "left room for another");
        }

        let history = match self.deps.message_ledger.room_history(room.id).await {
            Ok(history) => history,
            Err(err) => {
                self.registry.abort_join(connection_id, outcome.ticket).await;
                return Err(err);
            }
        };
        let count = history.len();
        if !self
            .registry
            .complete_join(connection_id, outcome.ticket, history)
            .await
        {
            tracing::debug!(%connection_id, room_id = %room.id, "join superseded before snapshot delivery");
            return Ok(());
        }
        tracing::info!(
            %connection_id,
            room_id = %room.id,
            history = count,
            rejoined = outcome.rejoined,
            "joined room"
        );
        Ok(())
    }

    async fn leave(&self, session: &Session, target: RoomTarget) -> Result<(), ApplicationError> {
        let Some(user) = session.identity.as_ref() else {
            return Ok(());
        };
        check_claim(user, target.user())?;
        let Some(room_id) = RoomId::parse(target.room_id()) else {
            return Ok(());
        };

        if self
            .registry
            .unsubscribe(session.connection_id, room_id)
            .await
        {
            tracing::info!(connection_id = %session.connection_id, %room_id, "left room");
        }
        Ok(())
    }

    async fn send(
        &self,
        session: &Session,
        payload: SendMessagePayload,
    ) -> Result<(), ApplicationError> {
        let user = require_identity(session, payload.user.as_ref())?;
        let room = self
            .deps
            .room_directory
            .resolve_room(&payload.room_id)
            .await?;
        let content = MessageContent::new(payload.content)?;

        let message = self
            .deps
            .message_ledger
            .create_message(CreateMessageRequest {
                content,
                room_id: room.id,
                user_id: user.id,
                created_at: self.deps.clock.now(),
            })
            .await?;

        let message_id = message.id;
        let delivered = self
            .registry
            .broadcast(room.id, ServerEvent::NewMessage(message), None)
            .await;
        tracing::debug!(%message_id, room_id = %room.id, delivered, "message broadcast");
        Ok(())
    }

    async fn update(
        &self,
        session: &Session,
        payload: UpdateMessagePayload,
    ) -> Result<(), ApplicationError> {
        let user = require_identity(session, payload.user.as_ref())?;
        let message = self
            .deps
            .message_ledger
            .update_message(UpdateMessageRequest {
                message_id: payload.message_id,
                content: payload.content,
                user_id: user.id,
            })
            .await?;

        // 以存储中的房间为准，而不是负载里声明的 roomId
        let room_id = RoomId::from(message.room_id);
        warn_on_room_mismatch(&payload.room_id, room_id);
        self.registry
            .broadcast(room_id, ServerEvent::MessageUpdated(message), None)
            .await;
        Ok(())
    }

    async fn delete(
        &self,
        session: &Session,
        payload: DeleteMessagePayload,
    ) -> Result<(), ApplicationError> {
        let user = require_identity(session, payload.user.as_ref())?;
        let deleted = self
            .deps
            .message_ledger
            .delete_message(DeleteMessageRequest {
                message_id: payload.message_id,
                user_id: user.id,
            })
            .await?;

        let room_id = RoomId::from(deleted.room_id);
        if let Some(claimed) = payload.room_id.as_deref() {
            warn_on_room_mismatch(claimed, room_id);
        }
        self.registry
            .broadcast(
                room_id,
                ServerEvent::MessageDeleted(deleted.id.to_string()),
                None,
            )
            .await;
        Ok(())
    }

    async fn reject(&self, session: &Session, event: &str, err: ApplicationError) {
        let connection_id = session.connection_id;
        match err.kind() {
            ErrorKind::Internal => {
                tracing::error!(%connection_id, event, error = %err, "socket event failed")
            }
            kind => {
                tracing::warn!(%connection_id, event, ?kind, error = %err, "socket event rejected")
            }
        }
        self.registry
            .send_to(connection_id, ServerEvent::Error(ErrorPayload::from(&err)))
            .await;
    }
}

fn require_identity<'a>(
    session: &'a Session,
    claimed: Option<&ClaimedUser>,
) -> Result<&'a AuthenticatedUser, ApplicationError> {
    let user = session
        .identity
        .as_ref()
        .ok_or_else(|| ApplicationError::unauthenticated("user not authenticated"))?;
    check_claim(user, claimed)?;
    Ok(user)
}

fn check_claim(user: &AuthenticatedUser, claimed: Option<&ClaimedUser>) -> Result<(), DomainError> {
    match claimed {
        Some(claimed) if Uuid::parse_str(claimed.id.trim()).ok() != Some(Uuid::from(user.id)) => {
            Err(DomainError::IdentityMismatch)
        }
        _ => Ok(()),
    }
}

fn warn_on_room_mismatch(claimed: &str, actual: RoomId) {
    if RoomId::parse(claimed) != Some(actual) {
        tracing::warn!(claimed_room = claimed, %actual, "payload room differs from stored message room");
    }
}
