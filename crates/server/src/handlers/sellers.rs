//! 卖家

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required_text, IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sweetpos_core::database::dao::seller::{NewSeller, Seller, SellerDao, SellerUpdate};
use sweetpos_core::Role;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateSellerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub commission_rate: Option<f64>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<Vec<Seller>>> {
    state.ready().await?;
    let sellers = state
        .run(move |conn| SellerDao::list(conn, query.include_archived))
        .await?;
    Ok(Json(sellers))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<CreateSellerRequest>,
) -> ApiResult<(StatusCode, Json<Seller>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let seller = NewSeller {
        name: required_text(body.name, "name")?,
        phone: body.phone,
        commission_rate: body.commission_rate,
    };
    let seller = state.run(move |conn| SellerDao::create(conn, &seller)).await?;
    Ok((StatusCode::CREATED, Json(seller)))
}

pub async fn update(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<SellerUpdate>,
) -> ApiResult<Json<Seller>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let seller = state
        .run(move |conn| SellerDao::update(conn, id, &body))
        .await?;
    Ok(Json(seller))
}

/// 归档卖家
pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    state.run(move |conn| SellerDao::archive(conn, id)).await?;
    Ok(Json(json!({ "ok": true })))
}
