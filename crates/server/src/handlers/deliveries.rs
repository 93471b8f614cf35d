//! 配送

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::delivery::{Delivery, DeliveryDao, NewDelivery};
use sweetpos_core::Role;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Delivery>>> {
    state.ready().await?;
    let limit = query.limit.unwrap_or(50);
    let deliveries = state.run(move |conn| DeliveryDao::list(conn, limit)).await?;
    Ok(Json(deliveries))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewDelivery>,
) -> ApiResult<(StatusCode, Json<Delivery>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let delivery = state
        .run(move |conn| DeliveryDao::create(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    state.run(move |conn| DeliveryDao::delete(conn, id)).await?;
    Ok(Json(json!({ "ok": true })))
}
