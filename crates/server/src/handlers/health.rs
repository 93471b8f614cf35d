//! 健康检查
//!
//! 不触发 Schema Gate，只报告当前状态。

use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use sweetpos_core::GateStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub schema: GateStatus,
    pub target_version: i64,
    /// 最近一次检查是否走了迁移
    pub migrated: Option<bool>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: sweetpos_core::version(),
        schema: state.gate.status(),
        target_version: state.gate.target_version(),
        migrated: state.gate.last_report().map(|r| r.ran_slow_path()),
    })
}
