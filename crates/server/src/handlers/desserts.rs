//! 甜品目录

use crate::auth::Actor;
use crate::error::{ApiError, ApiResult};
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::dessert::{Dessert, DessertDao, DessertUpdate, NewDessert};
use sweetpos_core::Role;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Dessert>>> {
    state.ready().await?;
    let desserts = state
        .run(move |conn| DessertDao::list(conn, query.include_inactive))
        .await?;
    Ok(Json(desserts))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewDessert>,
) -> ApiResult<(StatusCode, Json<Dessert>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    if body.name.trim().is_empty() || body.short_code.trim().is_empty() {
        return Err(ApiError::bad_request("甜品名称和短码不能为空"));
    }
    let dessert = state.run(move |conn| DessertDao::create(conn, &body)).await?;
    Ok((StatusCode::CREATED, Json(dessert)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<DessertUpdate>,
) -> ApiResult<Json<Dessert>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let dessert = state
        .run(move |conn| DessertDao::update(conn, id, &body))
        .await?;
    Ok(Json(dessert))
}

/// 软删除：下架但保留历史销售引用
pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    state.run(move |conn| DessertDao::deactivate(conn, id)).await?;
    Ok(Json(json!({ "ok": true })))
}
