//! Account endpoints

use axum::Json;
use axum::extract::{Query, State};

use skyrelay_users_core::CreateUserRequest;

use super::AppState;
use super::messages::{LogoutRequest, OkResponse, SearchQuery, UserResponse, UsersResponse};
use crate::error::Result;

/// `POST /api/register`
pub async fn register(State(state): State<AppState>, Json(req): Json<CreateUserRequest>) -> Result<Json<UserResponse>> {
    let user = state.users.register(req).await?;
    Ok(Json(UserResponse { ok: true, user }))
}

/// `POST /api/login`
pub async fn login(State(state): State<AppState>, Json(req): Json<CreateUserRequest>) -> Result<Json<UserResponse>> {
    let user = state.users.login(&req.username, &req.password).await?;
    Ok(Json(UserResponse { ok: true, user }))
}

/// `POST /api/logout`: drops the user's endpoint and ends their calls
pub async fn logout(State(state): State<AppState>, Json(req): Json<LogoutRequest>) -> Json<OkResponse> {
    state.coordinator.logout(&req.user_id).await;
    Json(OkResponse::ok())
}

/// `GET /api/search_users?q=`
pub async fn search_users(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Json<UsersResponse>> {
    let users = state.users.search(&query.q).await?;
    Ok(Json(UsersResponse { ok: true, users }))
}
