//! 进程内存储。
//!
//! 未配置数据库时使用，也是测试的默认后端。三张“表”共用一把读写锁，
//! 唯一性检查与写入在同一个写锁内完成，并发创建同名记录时只有一个成功。

use std::collections::HashMap;
use std::sync::Arc;

use application::{MessageRepository, RoomRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Author, HydratedMessage, Message, MessageId, RepositoryError, Room, RoomId, RoomName, User,
    UserId, Username,
};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    rooms: HashMap<RoomId, (u64, Room)>,
    messages: HashMap<MessageId, (u64, Message)>,
    // 写入序号，时间戳相同时用来保持插入顺序
    seq: u64,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn hydrate(&self, message: &Message) -> Result<HydratedMessage, RepositoryError> {
        let author = self
            .users
            .get(&message.user_id)
            .map(Author::from)
            .ok_or_else(|| RepositoryError::storage("message author does not exist"))?;
        Ok(HydratedMessage {
            message: message.clone(),
            author,
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.id)
            || tables.users.values().any(|u| u.username == user.username)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| &user.username == username)
            .cloned())
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.rooms.contains_key(&room.id)
            || tables.rooms.values().any(|(_, r)| r.name == room.name)
        {
            return Err(RepositoryError::Conflict);
        }
        let seq = tables.next_seq();
        tables.rooms.insert(room.id, (seq, room.clone()));
        Ok(room)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.get(&id).map(|(_, room)| room.clone()))
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .rooms
            .values()
            .find(|(_, room)| &room.name == name)
            .map(|(_, room)| room.clone()))
    }

    async fn list(&self) -> Result<Vec<Room>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut rooms: Vec<_> = tables.rooms.values().collect();
        rooms.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at.cmp(&a.created_at).then(b_seq.cmp(a_seq))
        });
        Ok(rooms.into_iter().map(|(_, room)| room.clone()).collect())
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn create(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict);
        }
        if !tables.rooms.contains_key(&message.room_id) {
            return Err(RepositoryError::NotFound);
        }
        let hydrated = tables.hydrate(&message)?;
        let seq = tables.next_seq();
        tables.messages.insert(message.id, (seq, message));
        Ok(hydrated)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<HydratedMessage>, RepositoryError> {
        let tables = self.tables.read().await;
        tables
            .messages
            .get(&id)
            .map(|(_, message)| tables.hydrate(message))
            .transpose()
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<HydratedMessage>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<_> = tables
            .messages
            .values()
            .filter(|(_, message)| message.room_id == room_id)
            .collect();
        messages.sort_by(|(a_seq, a), (b_seq, b)| {
            a.created_at.cmp(&b.created_at).then(a_seq.cmp(b_seq))
        });
        messages
            .into_iter()
            .map(|(_, message)| tables.hydrate(message))
            .collect()
    }

    async fn update(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        let mut tables = self.tables.write().await;
        let Some((_, stored)) = tables.messages.get_mut(&message.id) else {
            return Err(RepositoryError::NotFound);
        };
        stored.content = message.content;
        stored.updated_at = message.updated_at;
        let updated = stored.clone();
        tables.hydrate(&updated)
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables.messages.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound),
        }
    }
}
