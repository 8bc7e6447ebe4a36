mod message_ledger;
mod room_directory;
mod user_service;

pub use message_ledger::{
    CreateMessageRequest, DeleteMessageRequest, MessageLedger, MessageLedgerDependencies,
    UpdateMessageRequest,
};
pub use room_directory::{CreateRoomRequest, RoomDirectory, RoomDirectoryDependencies};
pub use user_service::{SignInRequest, SignUpRequest, UserService, UserServiceDependencies};
