#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::SystemClock;
use config::AppConfig;
use futures_util::StreamExt;
use infrastructure::{Infrastructure, InfrastructureConfig};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::timeout};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message as WsFrame},
    MaybeTlsStream, WebSocketStream,
};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub struct Session {
    pub user_id: String,
    pub token: String,
}

/// 使用进程内存储启动一个完整的服务实例
pub async fn spawn_server() -> TestServer {
    let mut config = AppConfig::default();
    config.auth.bcrypt_cost = Some(4);

    let infra = Infrastructure::connect(InfrastructureConfig::from(&config))
        .await
        .expect("in-memory infrastructure");
    let state = AppState::build(&infra, &config, Arc::new(SystemClock));
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        base_http: format!("http://{addr}"),
        base_ws: format!("ws://{addr}/ws"),
        client: Client::new(),
        shutdown: Some(shutdown_tx),
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_http, path)
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/signup"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("signup request")
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/signin"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("signin request")
    }

    /// 注册并登录，返回用户 ID 与 token
    pub async fn register(&self, username: &str) -> Session {
        let signup = self.sign_up(username, "secret-password").await;
        assert_eq!(signup.status(), 201);
        let body: Value = self
            .sign_in(username, "secret-password")
            .await
            .json()
            .await
            .expect("signin json");
        Session {
            user_id: body["user"]["id"].as_str().expect("user id").to_owned(),
            token: body["token"].as_str().expect("token").to_owned(),
        }
    }

    pub async fn create_room(&self, name: &str) -> Value {
        let response = self
            .client
            .post(self.url("/rooms"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("create room");
        assert_eq!(response.status(), 201);
        response.json().await.expect("room json")
    }

    /// 通过 `Authorization` 头携带 token 建立 socket 连接
    pub async fn connect(&self, token: Option<&str>) -> WsClient {
        let mut request = self
            .base_ws
            .as_str()
            .into_client_request()
            .expect("ws request");
        if let Some(token) = token {
            request.headers_mut().insert(
                "authorization",
                HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
            );
        }
        let (socket, _) = connect_async(request).await.expect("ws connect");
        socket
    }

    pub async fn connect_with_query_token(&self, token: &str) -> WsClient {
        let (socket, _) = connect_async(format!("{}?token={token}", self.base_ws))
            .await
            .expect("ws connect");
        socket
    }
}

pub fn frame(event: &str, data: Value) -> WsFrame {
    WsFrame::Text(json!({ "event": event, "data": data }).to_string().into())
}

/// 读取下一个 JSON 事件，跳过控制帧
pub async fn next_event(socket: &mut WsClient) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .expect("socket error");
        if let WsFrame::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("event json");
        }
    }
}

/// 断言在短时间内没有新的事件到达
pub async fn assert_silent(socket: &mut WsClient) {
    if let Ok(Some(Ok(WsFrame::Text(text)))) =
        timeout(Duration::from_millis(200), socket.next()).await
    {
        panic!("unexpected event: {text}");
    }
}
