//! 站内通知

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required, IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::notification::{NewNotification, Notification, NotificationDao};
use sweetpos_core::Role;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<i64>,
    #[serde(default)]
    pub unread_only: bool,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    state.ready().await?;
    let user_id = required(query.user_id, "user_id")?;
    let notifications = state
        .run(move |conn| NotificationDao::list_for_user(conn, user_id, query.unread_only))
        .await?;
    Ok(Json(notifications))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewNotification>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let notification = state
        .run(move |conn| NotificationDao::create(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    state.run(move |conn| NotificationDao::mark_read(conn, id)).await?;
    Ok(Json(json!({ "ok": true })))
}
