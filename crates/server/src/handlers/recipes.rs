//! 原料、配方、单位成本与生产登记

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required, IdPath, JsonBody};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sweetpos_core::database::dao::recipe::{
    Ingredient, IngredientDao, NewIngredient, NewRecipe, ProductionEntry, ProductionRecord, Recipe,
    RecipeDao,
};
use sweetpos_core::pricing::UnitCost;
use sweetpos_core::Role;

#[derive(Debug, Serialize)]
pub struct RecipeCatalog {
    pub ingredients: Vec<Ingredient>,
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCostRequest {
    pub unit_cost: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProductionRequest {
    pub entries: Option<Vec<ProductionEntry>>,
    #[serde(default)]
    pub user_ids: Vec<i64>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<RecipeCatalog>> {
    state.ready().await?;
    let catalog = state
        .run(|conn| {
            Ok(RecipeCatalog {
                ingredients: IngredientDao::list(conn)?,
                recipes: RecipeDao::list(conn)?,
            })
        })
        .await?;
    Ok(Json(catalog))
}

pub async fn create(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewRecipe>,
) -> ApiResult<(StatusCode, Json<Recipe>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let recipe = state.run(move |conn| RecipeDao::create(conn, &body)).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<NewIngredient>,
) -> ApiResult<(StatusCode, Json<Ingredient>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let ingredient = state
        .run(move |conn| IngredientDao::create(conn, &body))
        .await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

pub async fn update_ingredient(
    State(state): State<AppState>,
    actor: Actor,
    IdPath(id): IdPath,
    JsonBody(body): JsonBody<UpdateCostRequest>,
) -> ApiResult<Json<Value>> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let unit_cost = required(body.unit_cost, "unit_cost")?;
    state
        .run(move |conn| IngredientDao::update_cost(conn, id, unit_cost))
        .await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn unit_cost(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Json<UnitCost>> {
    state.ready().await?;
    let cost = state.run(move |conn| RecipeDao::unit_cost(conn, id)).await?;
    Ok(Json(cost))
}

pub async fn production(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(body): JsonBody<ProductionRequest>,
) -> ApiResult<(StatusCode, Json<ProductionRecord>)> {
    state.ready().await?;
    actor.require(Role::Admin)?;
    let entries = required(body.entries, "entries")?;
    let record = state
        .run(move |conn| RecipeDao::record_production(conn, &entries, &body.user_ids))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}
