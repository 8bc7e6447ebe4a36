//! 实时扇出：连接注册、房间订阅以及事件广播。

mod coordinator;
pub mod events;
mod registry;

pub use coordinator::{Connection, RealtimeCoordinator, RealtimeCoordinatorDependencies, Session};
pub use events::{ClientEvent, ErrorPayload, PresenceNotice, ServerEvent};
pub use registry::{
    ConnectionId, JoinTicket, LiveConnection, Outbox, SubscribeOutcome, SubscriberRegistry,
    OUTBOX_CAPACITY,
};
