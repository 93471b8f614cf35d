//! 账号与登录

use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::extract::{required_text, IdPath, JsonBody};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sweetpos_core::database::dao::user::{NewUser, User, UserDao, UserUpdate};
use sweetpos_core::Role;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

pub async fn list(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<User>>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let users = state.run(UserDao::list).await?;
    Ok(Json(users))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    state.ready().await?;
    actor.require(Role::Superadmin)?;
    let user = state.run(move |conn| UserDao::create(conn, &body)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<UserUpdate>,
) -> ApiResult<Json<User>> {
    state.ready().await?;
    actor.require(Role::Superadmin)?;
    let user = state
        .run(move |conn| UserDao::update(conn, id, &body))
        .await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> ApiResult<Json<User>> {
    state.ready().await?;
    let username = required_text(body.username, "username")?;
    let password = body
        .password
        .ok_or_else(|| ApiError::bad_request("缺少必填字段: password"))?;
    state
        .run(move |conn| UserDao::authenticate(conn, &username, &password))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("用户名或密码错误".to_string()))
}
