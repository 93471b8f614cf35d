//! 卖家日账

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required, required_text, IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::sale_day::{SaleDay, SaleDayDao};
use sweetpos_core::Role;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub seller_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDayRequest {
    pub seller_id: Option<i64>,
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseDayRequest {
    pub is_closed: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<SaleDay>>> {
    state.ready().await?;
    let seller_id = required(query.seller_id, "seller_id")?;
    let days = state
        .run(move |conn| SaleDayDao::list_for_seller(conn, seller_id))
        .await?;
    Ok(Json(days))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<CreateDayRequest>,
) -> ApiResult<(StatusCode, Json<SaleDay>)> {
    state.ready().await?;
    actor.require(Role::Seller)?;
    let seller_id = required(body.seller_id, "seller_id")?;
    let day = required_text(body.day, "day")?;
    let day = state
        .run(move |conn| SaleDayDao::create(conn, seller_id, &day))
        .await?;
    Ok((StatusCode::CREATED, Json(day)))
}

/// 结账或重新打开日账
pub async fn set_closed(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<CloseDayRequest>,
) -> ApiResult<Json<SaleDay>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let closed = required(body.is_closed, "is_closed")?;
    let day = state
        .run(move |conn| SaleDayDao::set_closed(conn, id, closed))
        .await?;
    Ok(Json(day))
}

pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    state.run(move |conn| SaleDayDao::delete(conn, id)).await?;
    tracing::info!("[Days] {} 删除日账 {}", actor.name(), id);
    Ok(Json(json!({ "ok": true })))
}
