use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::services::{
    AuthenticateUserRequest, RegisterUserRequest, UpdateProfileRequest,
};
use application::{MessageDto, UserDto};
use domain::Timestamp;

use crate::{auth::LoginResponse, error::ApiError, state::AppState, ws_connection::WsConnection};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    password: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct UpdateProfilePayload {
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
    before: Option<Timestamp>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/users", get(list_users))
        .route("/users/me", get(get_me).put(update_me))
        .route("/messages/{peer_id}", get(get_history))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<LoginResponse>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            password: payload.password,
            display_name: payload.display_name,
        })
        .await?;

    let token = state.jwt_service.generate_token(Uuid::from(user.id))?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            user: UserDto::from(&user),
            token,
        }),
    ))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            username: payload.username,
            password: payload.password,
        })
        .await?;

    let token = state.jwt_service.generate_token(Uuid::from(user.id))?;
    Ok(Json(LoginResponse {
        user: UserDto::from(&user),
        token,
    }))
}

async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let user = state.user_service.get_profile(user_id).await?;
    Ok(Json(UserDto::from(&user)))
}

async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfilePayload>,
) -> Result<Json<UserDto>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let user = state
        .user_service
        .update_profile(
            user_id,
            UpdateProfileRequest {
                display_name: payload.display_name,
                bio: payload.bio,
                avatar_url: payload.avatar_url,
            },
        )
        .await?;
    Ok(Json(UserDto::from(&user)))
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let users = state.user_service.list_others(user_id).await?;
    Ok(Json(users.iter().map(UserDto::from).collect()))
}

async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let messages = state
        .chat_service
        .history(user_id, peer_id, query.limit.unwrap_or(50), query.before)
        .await?;
    Ok(Json(messages.iter().map(MessageDto::from).collect()))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket 升级入口。
///
/// 认证在升级之前完成：凭证缺失或无效的连接在这里被拒绝，
/// 永远不会注册到连接中枢。
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state
        .jwt_service
        .verify_handshake_token(query.token.as_deref())?;

    Ok(ws.on_upgrade(move |socket| async move {
        WsConnection::new(state, user_id).run(socket).await;
    }))
}
