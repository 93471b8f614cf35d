//! 库存与库存变动

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use sweetpos_core::database::dao::inventory::{
    InventoryDao, InventoryItem, InventoryItemUpdate, Movement, NewInventoryItem, NewMovement,
};
use sweetpos_core::Role;

const DEFAULT_MOVEMENT_LIMIT: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct MovementQuery {
    pub item_id: Option<i64>,
    pub limit: Option<u32>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<InventoryItem>>> {
    state.ready().await?;
    let items = state.run(InventoryDao::list).await?;
    Ok(Json(items))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewInventoryItem>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let item = state
        .run(move |conn| InventoryDao::create(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<InventoryItemUpdate>,
) -> ApiResult<Json<InventoryItem>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let item = state
        .run(move |conn| InventoryDao::update(conn, id, &body))
        .await?;
    Ok(Json(item))
}

pub async fn list_movements(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<MovementQuery>,
) -> ApiResult<Json<Vec<Movement>>> {
    state.ready().await?;
    let limit = query.limit.unwrap_or(DEFAULT_MOVEMENT_LIMIT);
    let movements = state
        .run(move |conn| InventoryDao::list_movements(conn, query.item_id, limit))
        .await?;
    Ok(Json(movements))
}

/// 记录变动并返回更新后的库存项
pub async fn record_movement(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewMovement>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    state.ready().await?;
    actor.require(Role::Seller)?;
    let item = state
        .run(move |conn| InventoryDao::record_movement(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}
