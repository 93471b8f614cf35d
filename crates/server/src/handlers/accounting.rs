//! 记账

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{IdPath, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use sweetpos_core::database::dao::accounting::{
    AccountingDao, AccountingEntry, AccountingReport, DateRange, NewAccountingEntry,
};
use sweetpos_core::Role;

pub async fn list(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(range): QueryParams<DateRange>,
) -> ApiResult<Json<AccountingReport>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let report = state.run(move |conn| AccountingDao::list(conn, &range)).await?;
    Ok(Json(report))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewAccountingEntry>,
) -> ApiResult<(StatusCode, Json<AccountingEntry>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let entry = state
        .run(move |conn| AccountingDao::create(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn remove(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    state.run(move |conn| AccountingDao::delete(conn, id)).await?;
    Ok(Json(json!({ "ok": true })))
}
