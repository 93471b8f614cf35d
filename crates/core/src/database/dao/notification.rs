//! 站内通知数据访问对象

use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

pub struct NotificationDao;

impl NotificationDao {
    pub fn create(conn: &Connection, notification: &NewNotification) -> Result<Notification, DaoError> {
        let title = notification.title.trim();
        if title.is_empty() {
            return Err(DaoError::invalid("通知标题不能为空"));
        }
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO notifications (user_id, title, body, is_read, created_at)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![notification.user_id, title, notification.body, now],
        )
        .map_err(|e| super::map_foreign_key(e, &format!("用户 {} 不存在", notification.user_id)))?;
        Ok(Notification {
            id: conn.last_insert_rowid(),
            user_id: notification.user_id,
            title: title.to_string(),
            body: notification.body.clone(),
            is_read: false,
            created_at: now,
        })
    }

    /// 用户的通知，最新的在前
    pub fn list_for_user(
        conn: &Connection,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, body, is_read, created_at
             FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![user_id, unread_only], |row| {
            Ok(Notification {
                id: row.get(0)?,
                user_id: row.get(1)?,
                title: row.get(2)?,
                body: row.get(3)?,
                is_read: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn mark_read(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let changed = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("通知 {id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dao::test_support::migrated_conn;

    fn notify(conn: &Connection, title: &str) -> Notification {
        NotificationDao::create(
            conn,
            &NewNotification {
                user_id: 3,
                title: title.to_string(),
                body: String::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn unread_filter() {
        let conn = migrated_conn();
        let first = notify(&conn, "Stock bajo");
        notify(&conn, "Nueva entrega");
        NotificationDao::mark_read(&conn, first.id).unwrap();

        assert_eq!(NotificationDao::list_for_user(&conn, 3, false).unwrap().len(), 2);
        let unread = NotificationDao::list_for_user(&conn, 3, true).unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "Nueva entrega");
    }

    #[test]
    fn unknown_user_is_invalid() {
        let conn = migrated_conn();
        let err = NotificationDao::create(
            &conn,
            &NewNotification {
                user_id: 404,
                title: "hola".to_string(),
                body: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }
}
