//! 销售变更日志数据访问对象

use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLog {
    pub id: i64,
    pub sale_id: Option<i64>,
    pub actor_role: String,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: String,
}

pub struct ChangeLogDao;

impl ChangeLogDao {
    pub fn record(
        conn: &Connection,
        sale_id: Option<i64>,
        actor_role: &str,
        action: &str,
        details: &serde_json::Value,
    ) -> Result<i64, DaoError> {
        conn.execute(
            "INSERT INTO change_logs (sale_id, actor_role, action, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sale_id, actor_role, action, details.to_string(), now_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_for_sale(conn: &Connection, sale_id: i64) -> Result<Vec<ChangeLog>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, sale_id, actor_role, action, details, created_at
             FROM change_logs WHERE sale_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![sale_id], |row| {
            let details: String = row.get(4)?;
            Ok(ChangeLog {
                id: row.get(0)?,
                sale_id: row.get(1)?,
                actor_role: row.get(2)?,
                action: row.get(3)?,
                details: serde_json::from_str(&details).unwrap_or(serde_json::Value::Null),
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
