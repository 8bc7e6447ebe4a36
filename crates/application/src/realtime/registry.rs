//! 订阅者注册表
//!
//! 显式维护 房间 → 连接集合 的映射，只由协调器在 join / leave / disconnect
//! 时修改。所有修改与广播枚举都在同一把锁内完成，因此一次广播要么完整送达
//! 并发加入/离开的连接，要么完全不送达。`user-joined` / `user-left` 也在
//! 同一把锁内发出，一个连接在房间内的通知总是成对出现。
//!
//! 出站事件写入有界 channel，持锁期间只做 `try_send`；队列满的连接被逐出，
//! 其发送端被丢弃，传输层随之关闭并走正常的断开流程。同一房间的多次广播按
//! 取得锁的顺序入队，所有订阅者看到同一个顺序。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use domain::RoomId;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::dto::MessageDto;
use crate::realtime::events::{PresenceNotice, ServerEvent};

/// 每个连接最多积压的出站事件数
pub const OUTBOX_CAPACITY: usize = 256;

pub type Outbox = mpsc::Sender<Arc<ServerEvent>>;

/// 连接唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 某次 join 的凭据，用来识别已被更新的 join 取代的旧请求。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub ticket: JoinTicket,
    /// 因单房间策略被隐式离开的旧房间
    pub previous: Option<RoomId>,
    /// 重复加入当前房间
    pub rejoined: bool,
}

/// 注销连接时返回的最后状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConnection {
    pub id: ConnectionId,
    pub identity: Option<AuthenticatedUser>,
    pub room: Option<RoomId>,
}

struct ConnectionSlot {
    identity: Option<AuthenticatedUser>,
    room: Option<RoomId>,
    // 被逐出后为 None
    outbox: Option<Outbox>,
    // join 尚未拿到历史快照时，房间广播暂存在这里
    pending: Option<Vec<Arc<ServerEvent>>>,
    // 已随快照送达、广播尚未到达的消息
    in_snapshot: HashSet<Uuid>,
    // 房间已收到本连接的 user-joined
    announced: bool,
    ticket: u64,
}

impl ConnectionSlot {
    fn deliver(&mut self, event: &Arc<ServerEvent>) -> bool {
        if let ServerEvent::NewMessage(message) = event.as_ref() {
            if self.in_snapshot.remove(&message.id) {
                return false;
            }
        }
        match self.pending.as_mut() {
            Some(buffer) => {
                buffer.push(Arc::clone(event));
                true
            }
            None => self.push(Arc::clone(event)),
        }
    }

    fn push(&mut self, event: Arc<ServerEvent>) -> bool {
        let Some(outbox) = self.outbox.as_ref() else {
            return false;
        };
        match outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(capacity = OUTBOX_CAPACITY, "outbox full, evicting slow connection");
                self.outbox = None;
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.outbox = None;
                false
            }
        }
    }

    fn reset_join(&mut self) {
        self.pending = None;
        self.in_snapshot.clear();
    }

    fn presence(&self, room_id: RoomId) -> Option<PresenceNotice> {
        self.identity
            .as_ref()
            .map(|user| PresenceNotice::new(user, room_id))
    }
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionSlot>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
    next_ticket: u64,
}

impl RegistryState {
    fn detach(&mut self, connection_id: ConnectionId, room_id: RoomId) {
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }

    fn fan_out(
        &mut self,
        room_id: RoomId,
        event: Arc<ServerEvent>,
        except: Option<ConnectionId>,
    ) -> usize {
        let Some(members) = self.rooms.get(&room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for connection_id in members {
            if Some(*connection_id) == except {
                continue;
            }
            if let Some(slot) = self.connections.get_mut(connection_id) {
                if slot.deliver(&event) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    fn announce_departure(&mut self, room_id: RoomId, notice: Option<PresenceNotice>) {
        if let Some(notice) = notice {
            self.fan_out(room_id, Arc::new(ServerEvent::UserLeft(notice)), None);
        }
    }
}

#[derive(Default)]
pub struct SubscriberRegistry {
    state: Mutex<RegistryState>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        connection_id: ConnectionId,
        identity: Option<AuthenticatedUser>,
        outbox: Outbox,
    ) {
        let mut state = self.state.lock().await;
        state.connections.insert(
            connection_id,
            ConnectionSlot {
                identity,
                room: None,
                outbox: Some(outbox),
                pending: None,
                in_snapshot: HashSet::new(),
                announced: false,
                ticket: 0,
            },
        );
    }

    /// 移除连接及其订阅，返回连接最后的状态；未知连接返回 `None`。
    /// 只有房间已收到过 `user-joined` 时才发出 `user-left`。
    pub async fn unregister(&self, connection_id: ConnectionId) -> Option<LiveConnection> {
        let mut state = self.state.lock().await;
        let slot = state.connections.remove(&connection_id)?;
        if let Some(room_id) = slot.room {
            state.detach(connection_id, room_id);
            if slot.announced {
                state.announce_departure(room_id, slot.presence(room_id));
            }
        }
        Some(LiveConnection {
            id: connection_id,
            identity: slot.identity,
            room: slot.room,
        })
    }

    /// 以 pending 状态订阅房间。连接已在其他房间时先隐式离开。
    pub async fn subscribe(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Option<SubscribeOutcome> {
        let mut state = self.state.lock().await;
        state.next_ticket += 1;
        let ticket = state.next_ticket;

        let slot = state.connections.get_mut(&connection_id)?;
        let previous = slot.room.replace(room_id);
        let was_announced = slot.announced;
        slot.reset_join();
        slot.pending = Some(Vec::new());
        slot.ticket = ticket;

        let rejoined = previous == Some(room_id);
        slot.announced = rejoined && was_announced;
        let previous = previous.filter(|prev| *prev != room_id);
        let farewell = previous
            .filter(|_| was_announced)
            .and_then(|prev| slot.presence(prev));

        if let Some(prev) = previous {
            state.detach(connection_id, prev);
            state.announce_departure(prev, farewell);
        }
        state
            .rooms
            .entry(room_id)
            .or_default()
            .insert(connection_id);

        Some(SubscribeOutcome {
            ticket: JoinTicket(ticket),
            previous,
            rejoined,
        })
    }

    /// 投递历史快照并结束 pending 状态。
    ///
    /// 先入队 `room-messages`，再按原顺序冲刷暂存的广播。快照中已包含的
    /// `new-message` 无论在暂存区还是之后才到达都会被丢弃。首次进入房间时
    /// 向其余订阅者发出 `user-joined`。join 已被取代、连接已离开或断开时
    /// 返回 `false`。
    pub async fn complete_join(
        &self,
        connection_id: ConnectionId,
        ticket: JoinTicket,
        snapshot: Vec<MessageDto>,
    ) -> bool {
        let mut state = self.state.lock().await;
        let Some(slot) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        if slot.ticket != ticket.0 {
            return false;
        }
        let Some(room_id) = slot.room else {
            return false;
        };
        let Some(buffered) = slot.pending.take() else {
            return false;
        };

        slot.in_snapshot = snapshot.iter().map(|message| message.id).collect();
        slot.push(Arc::new(ServerEvent::RoomMessages(snapshot)));
        for event in buffered {
            if let ServerEvent::NewMessage(message) = event.as_ref() {
                if slot.in_snapshot.remove(&message.id) {
                    continue;
                }
            }
            slot.push(event);
        }

        let greeting = if slot.announced {
            None
        } else {
            slot.announced = true;
            slot.presence(room_id)
        };
        if let Some(notice) = greeting {
            state.fan_out(
                room_id,
                Arc::new(ServerEvent::UserJoined(notice)),
                Some(connection_id),
            );
        }
        true
    }

    /// 撤销尚未完成的 join（例如读取历史失败）。连接之前已在该房间宣告过
    /// 时，其余订阅者会收到 `user-left`。
    pub async fn abort_join(&self, connection_id: ConnectionId, ticket: JoinTicket) {
        let mut state = self.state.lock().await;
        let Some(slot) = state.connections.get_mut(&connection_id) else {
            return;
        };
        if slot.ticket != ticket.0 {
            return;
        }
        slot.reset_join();
        let Some(room_id) = slot.room.take() else {
            return;
        };
        let farewell = slot
            .announced
            .then(|| slot.presence(room_id))
            .flatten();
        slot.announced = false;

        state.detach(connection_id, room_id);
        state.announce_departure(room_id, farewell);
    }

    /// 未订阅该房间时返回 `false`，不做任何修改。
    pub async fn unsubscribe(&self, connection_id: ConnectionId, room_id: RoomId) -> bool {
        let mut state = self.state.lock().await;
        let Some(slot) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        if slot.room != Some(room_id) {
            return false;
        }
        slot.room = None;
        slot.reset_join();
        let farewell = slot
            .announced
            .then(|| slot.presence(room_id))
            .flatten();
        slot.announced = false;

        state.detach(connection_id, room_id);
        state.announce_departure(room_id, farewell);
        true
    }

    /// 向广播时刻的订阅者集合投递事件，返回接收的连接数。
    pub async fn broadcast(
        &self,
        room_id: RoomId,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let mut state = self.state.lock().await;
        state.fan_out(room_id, Arc::new(event), except)
    }

    /// 直接发给单个连接，不经过 pending 缓冲。
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let mut state = self.state.lock().await;
        state
            .connections
            .get_mut(&connection_id)
            .is_some_and(|slot| slot.push(Arc::new(event)))
    }

    /// 订阅者集合的只读快照
    pub async fn subscribers(&self, room_id: RoomId) -> Vec<ConnectionId> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(&room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        let state = self.state.lock().await;
        state.connections.get(&connection_id).and_then(|slot| slot.room)
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }
}
