//! 销售
//!
//! 修改和删除都会写入变更日志，记录操作者角色。

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required, IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::change_log::{ChangeLog, ChangeLogDao};
use sweetpos_core::database::dao::sale::{
    DaySales, NewSale, NewSaleItem, PaymentMethod, Sale, SaleDao, SaleUpdate,
};
use sweetpos_core::Role;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub day_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub day_id: Option<i64>,
    #[serde(default)]
    pub client_name: String,
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub comment: String,
    pub items: Option<Vec<NewSaleItem>>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<DaySales>> {
    state.ready().await?;
    let day_id = required(query.day_id, "day_id")?;
    let sales = state
        .run(move |conn| SaleDao::list_for_day(conn, day_id))
        .await?;
    Ok(Json(sales))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    state.ready().await?;
    actor.require(Role::Seller)?;
    let sale = NewSale {
        day_id: required(body.day_id, "day_id")?,
        client_name: body.client_name,
        payment_method: body.payment_method.unwrap_or(PaymentMethod::Cash),
        is_paid: body.is_paid,
        comment: body.comment,
        items: required(body.items, "items")?,
    };
    let role = actor.name();
    let sale = state
        .run(move |conn| SaleDao::create(conn, &sale, role))
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<SaleUpdate>,
) -> ApiResult<Json<Sale>> {
    state.ready().await?;
    actor.require(Role::Seller)?;
    let role = actor.name();
    let sale = state
        .run(move |conn| SaleDao::update(conn, id, &body, role))
        .await?;
    Ok(Json(sale))
}

pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let role = actor.name();
    state.run(move |conn| SaleDao::delete(conn, id, role)).await?;
    Ok(Json(json!({ "ok": true })))
}

/// 销售的变更日志
pub async fn logs(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Vec<ChangeLog>>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let logs = state
        .run(move |conn| ChangeLogDao::list_for_sale(conn, id))
        .await?;
    Ok(Json(logs))
}
