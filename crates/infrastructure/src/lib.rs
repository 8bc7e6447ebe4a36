//! 基础设施层实现。
//!
//! 提供 PostgreSQL 与进程内两套存储、bcrypt 密码哈希，实现应用层定义的端口。

pub mod builder;
pub mod memory;
pub mod migrations;
pub mod password;
pub mod repository;

pub use builder::{Infrastructure, InfrastructureConfig, InfrastructureError};
pub use memory::InMemoryStore;
pub use migrations::MIGRATOR;
pub use password::BcryptPasswordHasher;
pub use repository::{
    create_pg_pool, PgMessageRepository, PgRoomRepository, PgStorage, PgUserRepository,
};
