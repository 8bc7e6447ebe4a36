use std::sync::Arc;

use application::{MessageRepository, RoomRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Author, HydratedMessage, Message, MessageContent, MessageId, PasswordHash, RepositoryError,
    Room, RoomId, RoomName, User, UserId, Username,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return RepositoryError::Conflict,
            Some(FOREIGN_KEY_VIOLATION) => return RepositoryError::NotFound,
            _ => {}
        }
    }
    RepositoryError::storage(err.to_string())
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    password_hash: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password_hash).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            password,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct RoomRecord {
    id: Uuid,
    name: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<RoomRecord> for Room {
    type Error = RepositoryError;

    fn try_from(value: RoomRecord) -> Result<Self, Self::Error> {
        let name = RoomName::parse(value.name).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Room {
            id: RoomId::from(value.id),
            name,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// 消息与作者的联表结果
#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    username: String,
}

impl TryFrom<MessageRecord> for HydratedMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let user_id = UserId::from(value.user_id);

        Ok(HydratedMessage {
            message: Message {
                id: MessageId::from(value.id),
                room_id: RoomId::from(value.room_id),
                user_id,
                content,
                created_at: value.created_at,
                updated_at: value.updated_at,
            },
            author: Author {
                id: user_id,
                username,
            },
        })
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, username, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password_hash, created_at, updated_at
            "#,
        )
        .bind(Uuid::from(user.id))
        .bind(user.username.as_str())
        .bind(user.password.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password_hash, created_at, updated_at FROM users WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password_hash, created_at, updated_at FROM users WHERE username = $1"#,
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }
}

#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn create(&self, room: Room) -> Result<Room, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            INSERT INTO rooms (id, name, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(Uuid::from(room.id))
        .bind(room.name.as_str())
        .bind(room.created_at)
        .bind(room.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Room::try_from(record)
    }

    async fn find_by_id(&self, id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at, updated_at FROM rooms WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn find_by_name(&self, name: &RoomName) -> Result<Option<Room>, RepositoryError> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at, updated_at FROM rooms WHERE name = $1"#,
        )
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Room::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Room>, RepositoryError> {
        let records = sqlx::query_as::<_, RoomRecord>(
            r#"SELECT id, name, created_at, updated_at FROM rooms ORDER BY created_at DESC, seq DESC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Room::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (id, room_id, user_id, content, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, room_id, user_id, content, created_at, updated_at
            )
            SELECT i.id, i.room_id, i.user_id, i.content, i.created_at, i.updated_at, u.username
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.room_id))
        .bind(Uuid::from(message.user_id))
        .bind(message.content.as_str())
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        HydratedMessage::try_from(record)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<HydratedMessage>, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT m.id, m.room_id, m.user_id, m.content, m.created_at, m.updated_at, u.username
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(HydratedMessage::try_from).transpose()
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
    ) -> Result<Vec<HydratedMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT m.id, m.room_id, m.user_id, m.content, m.created_at, m.updated_at, u.username
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.room_id = $1
            ORDER BY m.created_at ASC, m.seq ASC
            "#,
        )
        .bind(Uuid::from(room_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(HydratedMessage::try_from).collect()
    }

    async fn update(&self, message: Message) -> Result<HydratedMessage, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            WITH updated AS (
                UPDATE messages
                SET content = $2, updated_at = $3
                WHERE id = $1
                RETURNING id, room_id, user_id, content, created_at, updated_at
            )
            SELECT m.id, m.room_id, m.user_id, m.content, m.created_at, m.updated_at, u.username
            FROM updated m
            JOIN users u ON u.id = m.user_id
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(message.content.as_str())
        .bind(message.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        .ok_or(RepositoryError::NotFound)?;

        HydratedMessage::try_from(record)
    }

    async fn delete(&self, id: MessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub room_repository: Arc<PgRoomRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            room_repository: Arc::new(PgRoomRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
