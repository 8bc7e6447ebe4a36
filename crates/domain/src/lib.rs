//! 聊天室系统核心领域模型
//!
//! 包含用户、聊天室、消息等核心实体以及值对象校验规则，不做任何 I/O。

pub mod errors;
pub mod message;
pub mod room;
pub mod user;
pub mod value_objects;

pub use errors::*;
pub use message::*;
pub use room::*;
pub use user::*;
pub use value_objects::*;
