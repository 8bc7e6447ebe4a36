#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use application::{
    realtime::ServerEvent, ApplicationError, AuthenticatedUser, Clock, Connection,
    CreateRoomRequest, MessageLedger, MessageLedgerDependencies, MessageRepository,
    RealtimeCoordinator, RealtimeCoordinatorDependencies, RoomDirectory,
    RoomDirectoryDependencies, RoomDto, SessionAuthenticator, SteppingClock, UserRepository,
};
use async_trait::async_trait;
use domain::{
    HydratedMessage, Message, MessageId, PasswordHash, RepositoryError, RoomId, User, UserId,
    Username,
};
use infrastructure::InMemoryStore;
use time::{macros::datetime, Duration};
use tokio::sync::Notify;

/// 测试用认证器：token 即 `token-<username>`
pub struct StaticAuthenticator {
    users: HashMap<String, AuthenticatedUser>,
}

#[async_trait]
impl SessionAuthenticator for StaticAuthenticator {
    async fn verify(&self, credential: &str) -> Result<AuthenticatedUser, ApplicationError> {
        self.users
            .get(credential)
            .cloned()
            .ok_or_else(|| ApplicationError::unauthenticated("invalid token"))
    }
}

/// 让下一次消息写入在落库之后、返回之前停住，直到测试放行
#[derive(Default)]
pub struct WriteGate {
    armed: AtomicBool,
    written: Notify,
    release: Notify,
}

impl WriteGate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn wait_written(&self) {
        self.written.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

struct GatedMessages {
    inner: InMemoryStore,
    gate: Arc<WriteGate>,
}

#[async_trait]
impl MessageRepository for GatedMessages {
    async fn create(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        let stored = MessageRepository::create(&self.inner, message).await?;
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.written.notify_one();
            self.gate.release.notified().await;
        }
        Ok(stored)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<HydratedMessage>, RepositoryError> {
        MessageRepository::find_by_id(&self.inner, id).await
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<HydratedMessage>, RepositoryError> {
        self.inner.list_by_room(room_id).await
    }

    async fn update(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        self.inner.update(message).await
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}

pub struct TestApp {
    pub store: InMemoryStore,
    pub gate: Arc<WriteGate>,
    pub coordinator: Arc<RealtimeCoordinator>,
    pub rooms: Arc<RoomDirectory>,
    pub ledger: Arc<MessageLedger>,
    pub users: HashMap<String, AuthenticatedUser>,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = InMemoryStore::new();
        let clock: Arc<dyn Clock> = Arc::new(SteppingClock::new(
            datetime!(2025-06-01 9:00 UTC),
            Duration::seconds(1),
        ));

        let mut users = HashMap::new();
        let mut tokens = HashMap::new();
        for name in ["alice", "bob", "carol"] {
            let user = User::register(
                UserId::generate(),
                Username::parse(name).unwrap(),
                PasswordHash::new("$2b$04$unused").unwrap(),
                clock.now(),
            );
            let user = UserRepository::create(&store, user).await.unwrap();
            let identity = AuthenticatedUser::from(&user);
            tokens.insert(format!("token-{name}"), identity.clone());
            users.insert(name.to_owned(), identity);
        }

        let gate = Arc::new(WriteGate::default());
        let messages: Arc<dyn MessageRepository> = Arc::new(GatedMessages {
            inner: store.clone(),
            gate: gate.clone(),
        });
        let rooms = Arc::new(RoomDirectory::new(RoomDirectoryDependencies {
            room_repository: Arc::new(store.clone()),
            message_repository: messages.clone(),
            clock: clock.clone(),
        }));
        let ledger = Arc::new(MessageLedger::new(MessageLedgerDependencies {
            message_repository: messages,
            clock: clock.clone(),
        }));
        let coordinator = Arc::new(RealtimeCoordinator::new(RealtimeCoordinatorDependencies {
            room_directory: rooms.clone(),
            message_ledger: ledger.clone(),
            authenticator: Arc::new(StaticAuthenticator { users: tokens }),
            clock,
        }));

        Self {
            store,
            gate,
            coordinator,
            rooms,
            ledger,
            users,
        }
    }

    pub fn user(&self, name: &str) -> &AuthenticatedUser {
        &self.users[name]
    }

    pub async fn create_room(&self, name: &str) -> RoomDto {
        self.rooms
            .create_room(CreateRoomRequest { name: name.into() })
            .await
            .unwrap()
    }

    pub async fn connect(&self, name: &str) -> Connection {
        self.coordinator
            .connect(Some(&format!("token-{name}")))
            .await
    }

    pub async fn anonymous(&self) -> Connection {
        self.coordinator.connect(None).await
    }

    pub async fn emit(&self, connection: &Connection, frame: serde_json::Value) {
        self.coordinator
            .dispatch(&connection.session, &frame.to_string())
            .await;
    }

    /// 加入房间并丢弃加入者自己收到的历史快照
    pub async fn join(&self, connection: &mut Connection, room_id: impl ToString) {
        self.emit(
            connection,
            serde_json::json!({"event": "join-room", "data": room_id.to_string()}),
        )
        .await;
        let events = drain(connection);
        assert!(
            matches!(events.first().map(|e| &**e), Some(ServerEvent::RoomMessages(_))),
            "expected room-messages, got {events:?}"
        );
    }
}

/// 取出连接当前已排队的全部事件
pub fn drain(connection: &mut Connection) -> Vec<Arc<ServerEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = connection.events.try_recv() {
        events.push(event);
    }
    events
}

pub fn names(events: &[Arc<ServerEvent>]) -> Vec<&'static str> {
    events.iter().map(|event| event.name()).collect()
}
