//! 账号数据访问对象
//!
//! 密码以 SHA-256 十六进制摘要保存，对外返回的 `User` 不含摘要。

use super::map_unique;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// 账号角色，按权限从低到高排序
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seller => "seller",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::Superadmin),
            other => Err(format!("未知角色: {other}")),
        }
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub seller_id: Option<i64>,
    pub is_active: bool,
    pub view_permissions: Vec<String>,
    pub feature_permissions: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub display_name: Option<String>,
    pub password: String,
    pub role: Role,
    pub seller_id: Option<i64>,
    #[serde(default)]
    pub view_permissions: Vec<String>,
    #[serde(default)]
    pub feature_permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub seller_id: Option<i64>,
    pub is_active: Option<bool>,
    /// 提供时整体替换
    pub view_permissions: Option<Vec<String>>,
    pub feature_permissions: Option<Vec<String>>,
}

const SELECT_USER: &str =
    "SELECT id, username, display_name, role, seller_id, is_active, created_at FROM users";

fn from_row(row: &Row<'_>) -> Result<User, rusqlite::Error> {
    let role: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: Role::try_from(role.as_str()).map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "role".into(), rusqlite::types::Type::Text)
        })?,
        seller_id: row.get(4)?,
        is_active: row.get(5)?,
        view_permissions: Vec::new(),
        feature_permissions: Vec::new(),
        created_at: row.get(6)?,
    })
}

fn load_permissions(conn: &Connection, user: &mut User) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT view_key FROM user_view_permissions WHERE user_id = ?1 ORDER BY view_key",
    )?;
    user.view_permissions = stmt
        .query_map(params![user.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT feature_key FROM user_feature_permissions WHERE user_id = ?1 ORDER BY feature_key",
    )?;
    user.feature_permissions = stmt
        .query_map(params![user.id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(())
}

fn replace_permissions(
    conn: &Connection,
    user_id: i64,
    table: &str,
    column: &str,
    keys: &[String],
) -> Result<(), rusqlite::Error> {
    conn.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), params![user_id])?;
    for key in keys {
        conn.execute(
            &format!("INSERT OR IGNORE INTO {table} (user_id, {column}) VALUES (?1, ?2)"),
            params![user_id, key.trim()],
        )?;
    }
    Ok(())
}

pub struct UserDao;

impl UserDao {
    pub fn list(conn: &Connection) -> Result<Vec<User>, DaoError> {
        let sql = format!("{SELECT_USER} ORDER BY username");
        let mut stmt = conn.prepare(&sql)?;
        let mut users = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for user in &mut users {
            load_permissions(conn, user)?;
        }
        Ok(users)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<User>, DaoError> {
        let sql = format!("{SELECT_USER} WHERE id = ?1");
        match conn.query_row(&sql, params![id], from_row).optional()? {
            Some(mut user) => {
                load_permissions(conn, &mut user)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub fn create(conn: &Connection, user: &NewUser) -> Result<User, DaoError> {
        let username = user.username.trim().to_lowercase();
        if username.is_empty() {
            return Err(DaoError::invalid("用户名不能为空"));
        }
        if user.password.len() < 4 {
            return Err(DaoError::invalid("密码至少 4 位"));
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO users (username, display_name, password_hash, role, seller_id, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
            params![
                username,
                user.display_name.as_deref().unwrap_or(&username),
                hash_password(&user.password),
                user.role.as_str(),
                user.seller_id,
                now_rfc3339(),
            ],
        )
        .map_err(|e| map_unique(e, &format!("用户名 {username} 已存在")))?;
        let id = tx.last_insert_rowid();
        replace_permissions(&tx, id, "user_view_permissions", "view_key", &user.view_permissions)?;
        replace_permissions(
            &tx,
            id,
            "user_feature_permissions",
            "feature_key",
            &user.feature_permissions,
        )?;
        tx.commit()?;

        tracing::info!("[Users] 新增账号 {} ({})", username, user.role);
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("用户 {id}")))
    }

    pub fn update(conn: &Connection, id: i64, update: &UserUpdate) -> Result<User, DaoError> {
        if update.password.as_ref().is_some_and(|p| p.len() < 4) {
            return Err(DaoError::invalid("密码至少 4 位"));
        }

        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE users
             SET display_name = COALESCE(?1, display_name),
                 password_hash = COALESCE(?2, password_hash),
                 role = COALESCE(?3, role),
                 seller_id = COALESCE(?4, seller_id),
                 is_active = COALESCE(?5, is_active)
             WHERE id = ?6",
            params![
                update.display_name,
                update.password.as_deref().map(hash_password),
                update.role.map(|r| r.as_str()),
                update.seller_id,
                update.is_active,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("用户 {id}")));
        }
        if let Some(keys) = &update.view_permissions {
            replace_permissions(&tx, id, "user_view_permissions", "view_key", keys)?;
        }
        if let Some(keys) = &update.feature_permissions {
            replace_permissions(&tx, id, "user_feature_permissions", "feature_key", keys)?;
        }
        tx.commit()?;

        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("用户 {id}")))
    }

    /// 校验用户名和密码，停用账号视为失败
    pub fn authenticate(
        conn: &Connection,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DaoError> {
        let row: Option<(i64, String, bool)> = conn
            .query_row(
                "SELECT id, password_hash, is_active FROM users WHERE username = ?1",
                params![username.trim().to_lowercase()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        match row {
            Some((id, hash, true)) if hash == hash_password(password) => Self::get(conn, id),
            _ => {
                tracing::warn!("[Users] 登录失败: {}", username);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dao::test_support::migrated_conn;
    use crate::database::seed::DEFAULT_PASSWORD;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Superadmin > Role::Admin);
        assert!(Role::Admin > Role::Seller);
        assert_eq!(Role::try_from(" Admin ").unwrap(), Role::Admin);
        assert!(Role::try_from("root").is_err());
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn seeded_accounts_can_log_in() {
        let conn = migrated_conn();
        let user = UserDao::authenticate(&conn, "Owner", DEFAULT_PASSWORD).unwrap().unwrap();
        assert_eq!(user.role, Role::Superadmin);
        assert!(UserDao::authenticate(&conn, "owner", "wrong").unwrap().is_none());
        assert!(UserDao::authenticate(&conn, "ghost", DEFAULT_PASSWORD).unwrap().is_none());
    }

    #[test]
    fn create_with_permissions_and_update() {
        let conn = migrated_conn();
        let user = UserDao::create(
            &conn,
            &NewUser {
                username: "Lucia".to_string(),
                display_name: None,
                password: "secreto".to_string(),
                role: Role::Seller,
                seller_id: None,
                view_permissions: vec!["sales".to_string(), "days".to_string()],
                feature_permissions: vec!["game".to_string()],
            },
        )
        .unwrap();
        assert_eq!(user.username, "lucia");
        assert_eq!(user.view_permissions, vec!["days".to_string(), "sales".to_string()]);

        let updated = UserDao::update(
            &conn,
            user.id,
            &UserUpdate {
                role: Some(Role::Admin),
                view_permissions: Some(vec![]),
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(updated.view_permissions.is_empty());
        assert_eq!(updated.feature_permissions, vec!["game".to_string()]);

        // 停用后无法登录
        assert!(UserDao::authenticate(&conn, "lucia", "secreto").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_invalid() {
        let conn = migrated_conn();
        let err = UserDao::create(
            &conn,
            &NewUser {
                username: "cashier".to_string(),
                display_name: None,
                password: "1234".to_string(),
                role: Role::Seller,
                seller_id: None,
                view_permissions: vec![],
                feature_permissions: vec![],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }
}
