use crate::value_objects::{RoomId, RoomName, Timestamp};

/// 聊天室。名称在系统内唯一，由 Room Directory 负责唯一性检查。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: RoomName,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Room {
    pub fn new(id: RoomId, name: RoomName, created_at: Timestamp) -> Self {
        Self {
            id,
            name,
            created_at,
            updated_at: created_at,
        }
    }
}
