//! 默认数据
//!
//! 仅当目标表为空时写入，重复执行不会产生重复行。

use super::dao::user::hash_password;
use super::now_rfc3339;
use rusqlite::{params, Connection};

/// 默认甜品目录：(名称, 短码, 单价, 排序)
pub const DEFAULT_DESSERTS: &[(&str, &str, f64, i64)] = &[
    ("Arcoíris", "arco", 9.0, 1),
    ("Melocotón", "melo", 9.0, 2),
    ("Maracuyá", "mara", 9.0, 3),
    ("Oreo", "oreo", 10.0, 4),
    ("Nutella", "nute", 10.0, 5),
];

/// 默认账号：(用户名, 显示名, 角色)
pub const DEFAULT_USERS: &[(&str, &str, &str)] = &[
    ("owner", "Owner", "superadmin"),
    ("manager", "Manager", "admin"),
    ("cashier", "Cashier", "seller"),
];

/// 默认账号的初始密码，首次登录后应修改
pub const DEFAULT_PASSWORD: &str = "sweetpos";

fn is_empty(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count == 0)
}

/// 写入默认甜品，返回插入行数
pub fn seed_desserts(conn: &Connection) -> Result<usize, rusqlite::Error> {
    if !is_empty(conn, "desserts")? {
        tracing::debug!("[Seed] desserts 非空，跳过");
        return Ok(0);
    }

    let now = now_rfc3339();
    let mut inserted = 0;
    for (name, short_code, price, sort_order) in DEFAULT_DESSERTS {
        inserted += conn.execute(
            "INSERT INTO desserts (name, short_code, price, sort_order, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![name, short_code, price, sort_order, now],
        )?;
    }
    tracing::info!("[Seed] 写入 {} 个默认甜品", inserted);
    Ok(inserted)
}

/// 写入默认账号，返回插入行数
pub fn seed_users(conn: &Connection) -> Result<usize, rusqlite::Error> {
    if !is_empty(conn, "users")? {
        tracing::debug!("[Seed] users 非空，跳过");
        return Ok(0);
    }

    let now = now_rfc3339();
    let password_hash = hash_password(DEFAULT_PASSWORD);
    let mut inserted = 0;
    for (username, display_name, role) in DEFAULT_USERS {
        inserted += conn.execute(
            "INSERT INTO users (username, display_name, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, display_name, password_hash, role, now],
        )?;
    }
    tracing::info!("[Seed] 写入 {} 个默认账号", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::create_tables;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("创建内存数据库失败");
        create_tables(&conn).expect("创建表结构失败");
        conn
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn seeds_only_into_empty_tables() {
        let conn = setup_conn();
        assert_eq!(seed_desserts(&conn).unwrap(), 5);
        assert_eq!(seed_users(&conn).unwrap(), 3);

        assert_eq!(seed_desserts(&conn).unwrap(), 0);
        assert_eq!(seed_users(&conn).unwrap(), 0);
        assert_eq!(count(&conn, "desserts"), 5);
        assert_eq!(count(&conn, "users"), 3);
    }

    #[test]
    fn populated_table_is_left_alone() {
        let conn = setup_conn();
        conn.execute(
            "INSERT INTO desserts (name, short_code, price, created_at) VALUES ('Flan', 'flan', 6, ?1)",
            params![now_rfc3339()],
        )
        .unwrap();

        assert_eq!(seed_desserts(&conn).unwrap(), 0);
        assert_eq!(count(&conn, "desserts"), 1);
    }
}
