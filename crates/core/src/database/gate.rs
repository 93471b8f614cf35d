//! Schema Gate
//!
//! 在任何业务查询之前保证数据库结构达到代码期望的版本。
//!
//! ## 状态机（进程内）
//! - `Unchecked`：尚未完成检查
//! - `Checking`：检查进行中，持有共享 future，并发调用方等待同一结果
//! - `Ready`：本进程已确认结构就绪，之后的调用不再访问数据库
//! - `Failed`：上次检查失败，行为等同 `Unchecked`，下次调用从头重试
//!
//! ## 检查流程
//! 1. prelude：每次检查都会确保的几张表
//! 2. 读取 schema_version，已达到目标版本则直接就绪
//! 3. 否则执行迁移计划，全部成功后最后写入版本号
//!
//! 版本号最后写入，中途失败时已执行的 DDL 都是幂等的，下次重跑即可。

use super::plan::{DdlCounter, MigrationPlan, MigrationReport};
use super::schema::TARGET_VERSION;
use super::version::{read_version, write_version};
use super::DbConnection;
use crate::errors::SchemaError;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// 可在多个等待方之间共享的检查错误
#[derive(Debug, Clone, Error)]
#[error(transparent)]
pub struct GateError(Arc<SchemaError>);

impl GateError {
    pub fn inner(&self) -> &SchemaError {
        &self.0
    }
}

impl From<SchemaError> for GateError {
    fn from(err: SchemaError) -> Self {
        Self(Arc::new(err))
    }
}

type CheckFuture = Shared<BoxFuture<'static, Result<(), GateError>>>;

enum GateState {
    Unchecked,
    Checking(CheckFuture),
    Ready,
    Failed(String),
}

/// 对外暴露的状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateStatus {
    Unchecked,
    Checking,
    Ready,
    Failed { error: String },
}

/// 运行计数
#[derive(Debug, Default)]
pub struct GateMetrics {
    /// 实际发起的检查次数（不含快速路径与单飞合并）
    pub checks_started: AtomicU64,
    /// 执行迁移计划的次数
    pub slow_path_runs: AtomicU64,
    /// 版本门控阶段执行的 DDL 总数
    pub gated_ddl: DdlCounter,
}

struct GateInner {
    db: DbConnection,
    plan: MigrationPlan,
    target_version: i64,
    state: Mutex<GateState>,
    metrics: GateMetrics,
    last_report: Mutex<Option<MigrationReport>>,
}

/// Schema Gate
///
/// 克隆开销很小，所有克隆共享同一状态。
#[derive(Clone)]
pub struct SchemaGate {
    inner: Arc<GateInner>,
}

impl SchemaGate {
    /// 使用标准迁移计划创建
    pub fn new(db: DbConnection) -> Self {
        Self::with_plan(db, MigrationPlan::standard(), TARGET_VERSION)
    }

    /// 使用自定义计划与目标版本创建
    pub fn with_plan(db: DbConnection, plan: MigrationPlan, target_version: i64) -> Self {
        Self {
            inner: Arc::new(GateInner {
                db,
                plan,
                target_version,
                state: Mutex::new(GateState::Unchecked),
                metrics: GateMetrics::default(),
                last_report: Mutex::new(None),
            }),
        }
    }

    /// 确保数据库结构就绪
    pub async fn ensure_schema(&self) -> Result<(), GateError> {
        let check = {
            let mut state = self.inner.state.lock();
            match &*state {
                GateState::Ready => return Ok(()),
                GateState::Checking(check) => check.clone(),
                GateState::Unchecked | GateState::Failed(_) => {
                    let check = self.start_check();
                    *state = GateState::Checking(check.clone());
                    check
                }
            }
        };
        check.await
    }

    fn start_check(&self) -> CheckFuture {
        let inner = self.inner.clone();
        async move {
            inner.metrics.checks_started.fetch_add(1, Ordering::SeqCst);

            let worker = inner.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let conn = worker.db.lock().map_err(|_| SchemaError::Poisoned)?;
                run_check(&conn, &worker.plan, worker.target_version, &worker.metrics)
            })
            .await
            .map_err(|e| SchemaError::Join(e.to_string()))
            .and_then(|result| result);

            let mut state = inner.state.lock();
            match outcome {
                Ok(report) => {
                    *state = GateState::Ready;
                    *inner.last_report.lock() = Some(report);
                    Ok(())
                }
                Err(err) => {
                    tracing::error!("[Schema] 结构检查失败，下次调用将重试: {}", err);
                    *state = GateState::Failed(err.to_string());
                    Err(GateError::from(err))
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn status(&self) -> GateStatus {
        match &*self.inner.state.lock() {
            GateState::Unchecked => GateStatus::Unchecked,
            GateState::Checking(_) => GateStatus::Checking,
            GateState::Ready => GateStatus::Ready,
            GateState::Failed(error) => GateStatus::Failed {
                error: error.clone(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.inner.state.lock(), GateState::Ready)
    }

    pub fn target_version(&self) -> i64 {
        self.inner.target_version
    }

    pub fn metrics(&self) -> &GateMetrics {
        &self.inner.metrics
    }

    /// 最近一次成功检查的报告
    pub fn last_report(&self) -> Option<MigrationReport> {
        self.inner.last_report.lock().clone()
    }
}

/// 单次检查（阻塞执行）
fn run_check(
    conn: &Connection,
    plan: &MigrationPlan,
    target_version: i64,
    metrics: &GateMetrics,
) -> Result<MigrationReport, SchemaError> {
    let prelude_statements = plan.apply_prelude(conn)?;

    let current = read_version(conn)?;
    if current >= target_version {
        tracing::debug!(
            "[Schema] 当前版本 {} 已满足目标 {}，跳过迁移",
            current,
            target_version
        );
        return Ok(MigrationReport::up_to_date(current, prelude_statements));
    }

    tracing::info!("[Schema] 开始迁移: {} -> {}", current, target_version);
    metrics.slow_path_runs.fetch_add(1, Ordering::SeqCst);

    let mut report = plan.apply(conn, &metrics.gated_ddl)?;
    write_version(conn, target_version)?;

    report.from_version = current;
    report.to_version = target_version;
    report.prelude_statements = prelude_statements;

    tracing::info!(
        "[Schema] 迁移完成: 版本 {}, DDL {} 条, 种子 {} 行, 回填 {} 行, 失败的尽力步骤 {:?}",
        target_version,
        report.gated_statements,
        report.seeded_rows,
        report.migrated_rows,
        report.best_effort_failures
    );
    Ok(report)
}
