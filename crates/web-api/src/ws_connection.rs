use std::sync::Arc;

use application::{Connection, RealtimeCoordinator, Session};
use axum::{
    body::Bytes,
    extract::ws::{Message as WsMessage, WebSocket},
};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};

/// WebSocket 连接
///
/// 把一条 socket 绑定到协调器中的一个连接：
/// - 发送任务把协调器投递的事件与 pong 写回客户端
/// - 接收任务按到达顺序把文本帧交给协调器处理
/// - 任一任务结束即视为断开，并通知协调器清理订阅
pub struct WebSocketConnection {
    socket: WebSocket,
    coordinator: Arc<RealtimeCoordinator>,
    connection: Connection,
}

impl WebSocketConnection {
    /// 握手凭证只在这里校验一次
    pub async fn open(
        socket: WebSocket,
        coordinator: Arc<RealtimeCoordinator>,
        credential: Option<String>,
    ) -> Self {
        let connection = coordinator.connect(credential.as_deref()).await;
        Self {
            socket,
            coordinator,
            connection,
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            coordinator,
            connection,
        } = self;
        let Connection {
            session,
            mut events,
        } = connection;
        let connection_id = session.connection_id;

        let (mut sender, incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        // 发送任务：所有对 sender 的写操作都在这里。
        // 协调器丢弃 outbox（断开或被逐出）时事件流结束。
        let send_task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendPong(data) => WsMessage::Pong(data),
                    },
                    event = events.recv() => match event {
                        Some(event) => match event.to_json() {
                            Ok(json) => WsMessage::Text(json.into()),
                            Err(err) => {
                                tracing::warn!(error = %err, event = event.name(), "failed to serialize socket event");
                                continue;
                            }
                        },
                        None => break,
                    },
                };
                if sender.send(frame).await.is_err() {
                    tracing::debug!("socket closed while sending");
                    break;
                }
            }
        });

        let recv_task = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                read_frames(incoming, stop_rx, &coordinator, &session, &cmd_tx).await;
            })
        };

        tokio::select! {
            _ = send_task => {
                // 不再读取新帧，正在处理的帧照常完成并广播
                let _ = stop_tx.send(());
                tracing::debug!(%connection_id, "socket send task finished");
            }
            _ = recv_task => {
                tracing::debug!(%connection_id, "socket receive task finished");
            }
        }

        coordinator.disconnect(connection_id).await;
    }
}

/// 接收循环：同一连接的帧按到达顺序逐个处理，收到 `stop` 后不再读取新帧。
async fn read_frames<S>(
    mut incoming: S,
    mut stop: oneshot::Receiver<()>,
    coordinator: &RealtimeCoordinator,
    session: &Session,
    commands: &mpsc::Sender<WsCommand>,
) where
    S: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut stop => break,
            frame = incoming.next() => frame,
        };
        let Some(Ok(message)) = frame else {
            break;
        };
        match message {
            WsMessage::Text(text) => {
                coordinator.dispatch(session, text.as_str()).await;
            }
            WsMessage::Ping(data) => {
                if commands.send(WsCommand::SendPong(data)).await.is_err() {
                    break;
                }
            }
            WsMessage::Pong(_) => {}
            WsMessage::Binary(_) => {
                tracing::debug!("ignoring binary frame");
            }
            WsMessage::Close(_) => break,
        }
    }
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Bytes),
}
