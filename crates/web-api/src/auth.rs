//! JWT 认证模块
//!
//! 提供 token 生成与校验、会话凭证提取，以及供 socket 握手使用的
//! `SessionAuthenticator` 实现。

use std::sync::Arc;

use application::{ApplicationError, AuthenticatedUser, SessionAuthenticator, UserService};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: Uuid,
    pub username: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    expiration_hours: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            expiration_hours: config.expiration_hours,
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
        }
    }

    /// token 有效期（秒），同时用作会话 cookie 的 Max-Age
    pub fn ttl_seconds(&self) -> i64 {
        Duration::hours(self.expiration_hours).whole_seconds()
    }

    pub fn generate_token(&self, user_id: Uuid, username: &str) -> Result<String, ApplicationError> {
        let exp = OffsetDateTime::now_utc() + Duration::hours(self.expiration_hours);
        let claims = Claims {
            user_id,
            username: username.to_owned(),
            exp: exp.unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApplicationError::infrastructure(format!("token generation failed: {err}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApplicationError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "token rejected");
                ApplicationError::unauthenticated("invalid token")
            })
    }
}

/// 校验签名后重新读取用户，已删除的用户视为未认证
pub struct JwtSessionAuthenticator {
    jwt: Arc<JwtService>,
    users: Arc<UserService>,
}

impl JwtSessionAuthenticator {
    pub fn new(jwt: Arc<JwtService>, users: Arc<UserService>) -> Self {
        Self { jwt, users }
    }
}

#[async_trait]
impl SessionAuthenticator for JwtSessionAuthenticator {
    async fn verify(&self, credential: &str) -> Result<AuthenticatedUser, ApplicationError> {
        let claims = self.jwt.verify_token(credential)?;
        self.users
            .resolve_identity(UserId::from(claims.user_id))
            .await
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// 按 cookie → `Authorization: Bearer` → `?token=` 的顺序查找凭证
pub fn extract_credential(
    headers: &HeaderMap,
    query_token: Option<&str>,
    cookie_name: &str,
) -> Option<String> {
    cookie_value(headers, cookie_name)
        .or_else(|| bearer_token(headers))
        .or_else(|| query_token.filter(|t| !t.is_empty()).map(str::to_owned))
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(name: &str, token: &str, max_age_seconds: i64) -> String {
    format!("{name}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_seconds}")
}

pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// 需要登录的 HTTP 处理函数使用的提取器
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let query = Query::<TokenQuery>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();
        let credential = extract_credential(
            &parts.headers,
            query.token.as_deref(),
            &state.cookie_name,
        )
        .ok_or_else(|| ApiError::unauthorized("missing session token"))?;

        let user = state.authenticator.verify(&credential).await?;
        Ok(CurrentUser(user))
    }
}
