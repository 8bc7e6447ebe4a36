use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::{AuthorDto, CreateRoomRequest, RoomDto, SignInRequest, SignUpRequest, UserDto};

use crate::{
    auth::{expired_cookie, extract_credential, session_cookie, CurrentUser, TokenQuery},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct CredentialsPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    name: String,
}

#[derive(Debug, Serialize)]
struct UserEnvelope<T> {
    user: T,
}

#[derive(Debug, Serialize)]
struct SignInResponse {
    user: UserDto,
    token: String,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
        .route("/auth/me", get(me))
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{room_id}", get(get_room))
        .route("/ws", get(websocket_upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 前端携带 cookie 跨域访问，因此只能列出具体来源而不能使用通配符
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope<UserDto>>), ApiError> {
    let Json(payload) = payload?;
    let user = state
        .user_service
        .sign_up(SignUpRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .user_service
        .sign_in(SignInRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(user.id, &user.username)?;
    let cookie = session_cookie(&state.cookie_name, &token, state.jwt_service.ttl_seconds());
    tracing::info!(user_id = %user.id, "user signed in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SignInResponse {
            user,
            token,
            message: "signed in",
        }),
    )
        .into_response())
}

async fn sign_out(State(state): State<AppState>) -> Response {
    (
        [(header::SET_COOKIE, expired_cookie(&state.cookie_name))],
        Json(MessageResponse {
            message: "signed out",
        }),
    )
        .into_response()
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserEnvelope<AuthorDto>> {
    Json(UserEnvelope {
        user: AuthorDto {
            id: user.id.into(),
            username: user.username.as_str().to_owned(),
        },
    })
}

async fn create_room(
    State(state): State<AppState>,
    payload: Result<Json<CreateRoomPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomDto>), ApiError> {
    let Json(payload) = payload?;
    let room = state
        .room_directory
        .create_room(CreateRoomRequest { name: payload.name })
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomDto>>, ApiError> {
    Ok(Json(state.room_directory.list_rooms().await?))
}

async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDto>, ApiError> {
    Ok(Json(state.room_directory.get_room_by_id(&room_id).await?))
}

async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Response {
    let credential = extract_credential(&headers, query.token.as_deref(), &state.cookie_name);
    let coordinator = state.coordinator.clone();
    ws.on_upgrade(move |socket| async move {
        WebSocketConnection::open(socket, coordinator, credential)
            .await
            .run()
            .await;
    })
}
