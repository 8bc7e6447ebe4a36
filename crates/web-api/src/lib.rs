//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给应用层的用例服务与实时协调器。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{
    extract_credential, Claims, CurrentUser, JwtService, JwtSessionAuthenticator, TokenQuery,
};
pub use error::{ApiError, ErrorBody};
pub use routes::{cors_layer, router};
pub use state::AppState;
