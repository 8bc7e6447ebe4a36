use std::sync::Arc;

use application::{MessageRepository, PasswordHasher, RoomRepository, UserRepository};
use config::AppConfig;
use thiserror::Error;

use crate::{
    memory::InMemoryStore,
    migrations::MIGRATOR,
    password::BcryptPasswordHasher,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    /// 为空时使用进程内存储
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bcrypt_cost: Option<u32>,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            bcrypt_cost: None,
        }
    }
}

impl From<&AppConfig> for InfrastructureConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            database_url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            bcrypt_cost: config.auth.bcrypt_cost,
        }
    }
}

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 存储与密码哈希适配器的装配结果，只以 trait 对象的形式交给应用层。
#[derive(Clone)]
pub struct Infrastructure {
    pub user_repository: Arc<dyn UserRepository>,
    pub room_repository: Arc<dyn RoomRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
    pub backend: &'static str,
}

impl Infrastructure {
    pub async fn connect(config: InfrastructureConfig) -> Result<Self, InfrastructureError> {
        let password_hasher: Arc<dyn PasswordHasher> =
            Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost));

        let Some(database_url) = config.database_url.as_deref() else {
            tracing::warn!("database url not configured, data will not survive a restart");
            return Ok(Self::in_memory(InMemoryStore::new(), password_hasher));
        };

        let pool = create_pg_pool(database_url, config.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!(max_connections = config.max_connections, "postgres storage ready");

        let storage = PgStorage::new(pool);
        Ok(Self {
            user_repository: storage.user_repository,
            room_repository: storage.room_repository,
            message_repository: storage.message_repository,
            password_hasher,
            backend: "postgres",
        })
    }

    pub fn in_memory(store: InMemoryStore, password_hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            user_repository: Arc::new(store.clone()),
            room_repository: Arc::new(store.clone()),
            message_repository: Arc::new(store),
            password_hasher,
            backend: "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_to_memory_without_database_url() {
        let infra = Infrastructure::connect(InfrastructureConfig::default())
            .await
            .unwrap();
        assert_eq!(infra.backend, "memory");
    }

    #[test]
    fn reads_app_config() {
        let mut app = AppConfig::default();
        app.database.url = Some("postgres://localhost/chat".into());
        app.auth.bcrypt_cost = Some(8);

        let config = InfrastructureConfig::from(&app);

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/chat"));
        assert_eq!(config.bcrypt_cost, Some(8));
        assert_eq!(config.max_connections, 5);
    }
}
