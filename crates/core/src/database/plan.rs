//! 声明式迁移计划
//!
//! 计划是按依赖顺序排列的 `MigrationStep` 列表：
//! 版本行 -> 建表 -> 加列 -> 种子数据 -> 数据回填与去重 -> 索引。
//!
//! 步骤分两类：
//! - `Critical`：结构性步骤，失败立即中止并向上传播
//! - `BestEffort`：种子与回填，失败只记录警告，下次冷启动自然重试
//!
//! 每个步骤都必须可以重复执行任意次。

use super::backfill::{backfill_sale_items, dedupe_game_plays};
use super::schema::{column_exists, ColumnDef, IndexDef, TableDef, COLUMNS, INDEXES, PRELUDE_TABLES, TABLES};
use super::seed::{seed_desserts, seed_users};
use super::version::seed_version_row;
use crate::errors::SchemaError;
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 自定义步骤：返回受影响的行数
pub type StepFn = Arc<dyn Fn(&Connection) -> Result<usize, rusqlite::Error> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Critical,
    BestEffort,
}

/// 步骤产出的数据归类，用于汇总报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCategory {
    Structure,
    Seed,
    DataMigration,
}

#[derive(Clone)]
pub enum StepAction {
    CreateTable(TableDef),
    AddColumn(ColumnDef),
    CreateIndex(IndexDef),
    Run(StepFn),
}

#[derive(Clone)]
pub struct MigrationStep {
    pub name: String,
    pub kind: StepKind,
    pub category: StepCategory,
    pub action: StepAction,
}

impl MigrationStep {
    pub fn create_table(table: TableDef) -> Self {
        Self {
            name: format!("create_table:{}", table.name),
            kind: StepKind::Critical,
            category: StepCategory::Structure,
            action: StepAction::CreateTable(table),
        }
    }

    pub fn add_column(column: ColumnDef) -> Self {
        Self {
            name: format!("add_column:{}.{}", column.table, column.column),
            kind: StepKind::Critical,
            category: StepCategory::Structure,
            action: StepAction::AddColumn(column),
        }
    }

    pub fn create_index(index: IndexDef) -> Self {
        Self {
            name: format!("create_index:{}", index.name),
            kind: StepKind::Critical,
            category: StepCategory::Structure,
            action: StepAction::CreateIndex(index),
        }
    }

    pub fn run(
        name: impl Into<String>,
        kind: StepKind,
        category: StepCategory,
        f: impl Fn(&Connection) -> Result<usize, rusqlite::Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            category,
            action: StepAction::Run(Arc::new(f)),
        }
    }

    /// 执行单个步骤
    fn execute(&self, conn: &Connection) -> Result<StepOutcome, rusqlite::Error> {
        match &self.action {
            StepAction::CreateTable(table) => {
                conn.execute(table.sql, [])?;
                Ok(StepOutcome::ddl())
            }
            StepAction::AddColumn(column) => {
                if column_exists(conn, column.table, column.column)? {
                    return Ok(StepOutcome::skipped());
                }
                conn.execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        column.table, column.column, column.definition
                    ),
                    [],
                )?;
                tracing::info!("[Schema] 新增列 {}.{}", column.table, column.column);
                Ok(StepOutcome::ddl())
            }
            StepAction::CreateIndex(index) => {
                conn.execute(index.sql, [])?;
                Ok(StepOutcome::ddl())
            }
            StepAction::Run(f) => Ok(StepOutcome::rows(f(conn)?)),
        }
    }
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("category", &self.category)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StepOutcome {
    ddl_statements: u64,
    rows: usize,
}

impl StepOutcome {
    fn ddl() -> Self {
        Self {
            ddl_statements: 1,
            rows: 0,
        }
    }

    fn skipped() -> Self {
        Self::default()
    }

    fn rows(rows: usize) -> Self {
        Self {
            ddl_statements: 0,
            rows,
        }
    }
}

/// 一次迁移运行的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    /// prelude 阶段执行的 DDL 数
    pub prelude_statements: u64,
    /// 版本门控阶段执行的 DDL 数
    pub gated_statements: u64,
    pub seeded_rows: usize,
    pub migrated_rows: usize,
    /// 失败的尽力而为步骤
    pub best_effort_failures: Vec<String>,
}

impl MigrationReport {
    /// 版本已满足时的报告
    pub fn up_to_date(version: i64, prelude_statements: u64) -> Self {
        Self {
            from_version: version,
            to_version: version,
            prelude_statements,
            ..Self::default()
        }
    }

    pub fn ran_slow_path(&self) -> bool {
        self.from_version != self.to_version
    }
}

/// 共享的 DDL 计数器，测试据此断言是否执行了门控 DDL
#[derive(Debug, Default)]
pub struct DdlCounter(AtomicU64);

impl DdlCounter {
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// 迁移计划
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    prelude: Vec<MigrationStep>,
    steps: Vec<MigrationStep>,
}

impl Default for MigrationPlan {
    fn default() -> Self {
        Self::standard()
    }
}

impl MigrationPlan {
    /// 标准计划
    pub fn standard() -> Self {
        let prelude = PRELUDE_TABLES
            .iter()
            .copied()
            .map(MigrationStep::create_table)
            .collect();

        let mut steps = vec![MigrationStep::run(
            "seed_version_row",
            StepKind::Critical,
            StepCategory::Structure,
            seed_version_row,
        )];
        steps.extend(TABLES.iter().copied().map(MigrationStep::create_table));
        steps.extend(COLUMNS.iter().copied().map(MigrationStep::add_column));
        steps.push(MigrationStep::run(
            "seed_desserts",
            StepKind::BestEffort,
            StepCategory::Seed,
            seed_desserts,
        ));
        steps.push(MigrationStep::run(
            "seed_users",
            StepKind::BestEffort,
            StepCategory::Seed,
            seed_users,
        ));
        steps.push(MigrationStep::run(
            "backfill_sale_items",
            StepKind::BestEffort,
            StepCategory::DataMigration,
            |conn| backfill_sale_items(conn).map(|stats| stats.items_created),
        ));
        // 唯一索引 idx_game_plays_phone_day 之前必须先去重
        steps.push(MigrationStep::run(
            "dedupe_game_plays",
            StepKind::BestEffort,
            StepCategory::DataMigration,
            dedupe_game_plays,
        ));
        steps.extend(INDEXES.iter().copied().map(MigrationStep::create_index));

        Self { prelude, steps }
    }

    /// 在指定步骤之后插入额外步骤
    pub fn insert_after(mut self, anchor: &str, step: MigrationStep) -> Self {
        let position = self
            .steps
            .iter()
            .position(|s| s.name == anchor)
            .map(|i| i + 1)
            .unwrap_or(self.steps.len());
        self.steps.insert(position, step);
        self
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn prelude(&self) -> &[MigrationStep] {
        &self.prelude
    }

    /// 执行 prelude（每次检查都会运行），返回 DDL 数
    pub fn apply_prelude(&self, conn: &Connection) -> Result<u64, SchemaError> {
        let mut statements = 0;
        for step in &self.prelude {
            let outcome = step.execute(conn).map_err(|source| SchemaError::Step {
                step: step.name.clone(),
                source,
            })?;
            statements += outcome.ddl_statements;
        }
        Ok(statements)
    }

    /// 执行版本门控步骤
    pub fn apply(&self, conn: &Connection, counter: &DdlCounter) -> Result<MigrationReport, SchemaError> {
        let mut report = MigrationReport::default();

        for step in &self.steps {
            match step.execute(conn) {
                Ok(outcome) => {
                    report.gated_statements += outcome.ddl_statements;
                    counter.add(outcome.ddl_statements);
                    match step.category {
                        StepCategory::Seed => report.seeded_rows += outcome.rows,
                        StepCategory::DataMigration => report.migrated_rows += outcome.rows,
                        StepCategory::Structure => {}
                    }
                }
                Err(source) if step.kind == StepKind::BestEffort => {
                    tracing::warn!("[Schema] 尽力而为步骤 {} 失败，已跳过: {}", step.name, source);
                    report.best_effort_failures.push(step.name.clone());
                }
                Err(source) => {
                    tracing::error!("[Schema] 步骤 {} 失败: {}", step.name, source);
                    return Err(SchemaError::Step {
                        step: step.name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::version::read_version;

    fn count(conn: &Connection, sql: &str) -> i64 {
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }

    fn column_count(conn: &Connection, table: &str) -> i64 {
        count(
            conn,
            &format!("SELECT COUNT(*) FROM pragma_table_info('{table}')"),
        )
    }

    #[test]
    fn standard_plan_orders_structure_before_data_before_indexes() {
        let plan = MigrationPlan::standard();
        let names: Vec<&str> = plan.steps().iter().map(|s| s.name.as_str()).collect();
        let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();

        assert_eq!(names[0], "seed_version_row");
        assert!(pos("create_table:sales") < pos("add_column:sales.payment_method"));
        assert!(pos("add_column:inventory_items.ingredient_id") < pos("seed_desserts"));
        assert!(pos("seed_desserts") < pos("backfill_sale_items"));
        assert!(pos("backfill_sale_items") < pos("create_index:idx_sales_day"));
        assert!(pos("dedupe_game_plays") < pos("create_index:idx_game_plays_phone_day"));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::standard();
        let counter = DdlCounter::default();

        plan.apply_prelude(&conn).unwrap();
        let first = plan.apply(&conn, &counter).unwrap();
        let sales_columns = column_count(&conn, "sales");

        plan.apply_prelude(&conn).unwrap();
        let second = plan.apply(&conn, &counter).unwrap();

        assert_eq!(first.seeded_rows, 8);
        assert_eq!(second.seeded_rows, 0);
        assert!(second.best_effort_failures.is_empty());
        assert_eq!(column_count(&conn, "sales"), sales_columns);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM desserts"), 5);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM users"), 3);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM schema_version"), 1);
        // apply 本身不写版本号
        assert_eq!(read_version(&conn).unwrap(), 0);
    }

    #[test]
    fn second_run_skips_existing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::standard();
        let counter = DdlCounter::default();
        plan.apply_prelude(&conn).unwrap();

        let first = plan.apply(&conn, &counter).unwrap();
        let second = plan.apply(&conn, &counter).unwrap();

        assert_eq!(
            first.gated_statements - second.gated_statements,
            COLUMNS.len() as u64
        );
    }

    #[test]
    fn best_effort_failure_does_not_abort() {
        let conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::standard().insert_after(
            "seed_users",
            MigrationStep::run(
                "broken_seed",
                StepKind::BestEffort,
                StepCategory::Seed,
                |conn| conn.execute("INSERT INTO missing_table VALUES (1)", []),
            ),
        );
        plan.apply_prelude(&conn).unwrap();

        let report = plan.apply(&conn, &DdlCounter::default()).unwrap();
        assert_eq!(report.best_effort_failures, vec!["broken_seed".to_string()]);
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'idx_sales_day'"), 1);
    }

    #[test]
    fn critical_failure_aborts_before_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        let plan = MigrationPlan::standard().insert_after(
            "create_table:time_sessions",
            MigrationStep::run(
                "broken_ddl",
                StepKind::Critical,
                StepCategory::Structure,
                |conn| conn.execute("ALTER TABLE missing_table ADD COLUMN x TEXT", []),
            ),
        );
        plan.apply_prelude(&conn).unwrap();

        let err = plan.apply(&conn, &DdlCounter::default()).unwrap_err();
        assert!(matches!(err, SchemaError::Step { ref step, .. } if step == "broken_ddl"));
        assert_eq!(count(&conn, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'idx_sales_day'"), 0);
    }
}
