//! 应用层实现。
//!
//! 这里提供围绕领域模型的用例服务（房间目录、消息账本、用户认证），
//! 以及把 socket 事件扇出到房间订阅者的实时协调器。存储与密码哈希
//! 等外部协作方只以 trait 的形式出现。

pub mod auth;
pub mod clock;
pub mod dto;
pub mod error;
pub mod realtime;
pub mod repository;
pub mod services;

pub use auth::{AuthenticatedUser, PasswordHasher, PasswordHasherError, SessionAuthenticator};
pub use clock::{Clock, SteppingClock, SystemClock};
pub use dto::{AuthorDto, MessageDto, RoomDto, UserDto};
pub use error::{ApplicationError, ErrorKind};
pub use realtime::{
    ClientEvent, Connection, ConnectionId, ErrorPayload, PresenceNotice, RealtimeCoordinator,
    RealtimeCoordinatorDependencies, ServerEvent, Session, SubscriberRegistry,
};
pub use repository::{MessageRepository, RoomRepository, UserRepository};
pub use services::{
    CreateMessageRequest, CreateRoomRequest, DeleteMessageRequest, MessageLedger,
    MessageLedgerDependencies, RoomDirectory, RoomDirectoryDependencies, SignInRequest,
    SignUpRequest, UpdateMessageRequest, UserService, UserServiceDependencies,
};
