//! 数据库模块
//!
//! - `schema`: 表、列、索引定义
//! - `plan`: 声明式迁移计划与执行驱动
//! - `seed` / `backfill`: 尽力而为的数据步骤
//! - `version`: schema_version 单行记录
//! - `gate`: Schema Gate（版本门控 + 单飞）
//! - `dao`: 各业务表的数据访问对象

pub mod backfill;
pub mod dao;
pub mod gate;
pub mod plan;
pub mod schema;
pub mod seed;
pub mod version;

use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

/// 进程内共享的数据库连接
pub type DbConnection = Arc<Mutex<Connection>>;

/// 打开数据库连接
///
/// 支持 `sqlite://path`、`sqlite:path`、纯路径和 `:memory:`。
pub fn open_connection(database_url: &str) -> Result<DbConnection, rusqlite::Error> {
    let path = database_path(database_url);
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    configure(&conn)?;
    tracing::info!("[Database] 已打开数据库: {}", path);
    Ok(Arc::new(Mutex::new(conn)))
}

/// 从连接串中取出 SQLite 文件路径
pub fn database_path(database_url: &str) -> &str {
    let trimmed = database_url.trim();
    trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed)
}

fn configure(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    // 内存库不支持 WAL，返回值忽略
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    Ok(())
}

/// 当前 UTC 时间（RFC 3339）
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// 当前 UTC 日期（YYYY-MM-DD）
pub fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_strips_scheme() {
        assert_eq!(database_path("sqlite:///var/db/shop.db"), "/var/db/shop.db");
        assert_eq!(database_path("sqlite:shop.db"), "shop.db");
        assert_eq!(database_path(" shop.db "), "shop.db");
        assert_eq!(database_path(":memory:"), ":memory:");
    }

    #[test]
    fn open_file_database_enables_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let db = open_connection(&format!("sqlite://{}", path.display())).unwrap();
        let conn = db.lock().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
