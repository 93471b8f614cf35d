//! schema_version 单行记录
//!
//! 整个库只有 `id = 1` 一行。版本号单调不减，只在全部 DDL 成功后写入。

use super::{now_rfc3339, schema::table_exists};
use rusqlite::{params, Connection, OptionalExtension};

/// 读取当前结构版本；表或行不存在时视为 0
pub fn read_version(conn: &Connection) -> Result<i64, rusqlite::Error> {
    if !table_exists(conn, "schema_version")? {
        return Ok(0);
    }
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM schema_version WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0))
}

/// 插入初始行（已存在则不动），返回插入行数
pub fn seed_version_row(conn: &Connection) -> Result<usize, rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (id, version, updated_at) VALUES (1, 0, ?1)",
        params![now_rfc3339()],
    )
}

/// 写入目标版本，永不回退
pub fn write_version(conn: &Connection, version: i64) -> Result<(), rusqlite::Error> {
    seed_version_row(conn)?;
    conn.execute(
        "UPDATE schema_version SET version = MAX(version, ?1), updated_at = ?2 WHERE id = 1",
        params![version, now_rfc3339()],
    )?;
    Ok(())
}
