//! 促销转盘
//!
//! 任何人都可以抽奖，同一手机号每天一次。

use crate::auth::Actor;
use crate::error::ApiResult;
use crate::extract::{required_text, JsonBody, QueryParams};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sweetpos_core::database::dao::game_play::{GamePlay, GamePlayDao};
use sweetpos_core::database::today;
use sweetpos_core::game::{spin, Prize, PRIZES};
use sweetpos_core::{DaoError, Role};

#[derive(Debug, Serialize)]
pub struct GameOverview {
    pub prizes: &'static [Prize],
    /// 仅管理员可见
    pub plays: Vec<GamePlay>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpinRequest {
    #[serde(default)]
    pub player_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SpinResult {
    pub prize: &'static Prize,
    pub play: GamePlay,
}

pub async fn overview(
    State(state): State<AppState>,
    actor: Actor,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Json<GameOverview>> {
    state.ready().await?;
    let plays = if actor.require(Role::Admin).is_ok() {
        state
            .run(move |conn| GamePlayDao::list(conn, query.day.as_deref()))
            .await?
    } else {
        Vec::new()
    };
    Ok(Json(GameOverview {
        prizes: PRIZES,
        plays,
    }))
}

pub async fn play(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SpinRequest>,
) -> ApiResult<(StatusCode, Json<SpinResult>)> {
    state.ready().await?;
    let phone = required_text(body.phone, "phone")?;
    let day = today();

    let result = state
        .run(move |conn| {
            if GamePlayDao::has_played(conn, &phone, &day)? {
                return Err(DaoError::invalid("今天已经抽过奖"));
            }
            let prize = spin(&mut rand::thread_rng());
            let play = GamePlayDao::record_play(conn, &body.player_name, &phone, prize.code, &day)?;
            Ok(SpinResult { prize, play })
        })
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}
