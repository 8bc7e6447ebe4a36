use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub password: PasswordHash,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn register(id: UserId, username: Username, password: PasswordHash, now: Timestamp) -> Self {
        Self {
            id,
            username,
            password,
            created_at: now,
            updated_at: now,
        }
    }
}
