//! 数据访问对象
//!
//! 每个 DAO 都是无状态的，接收 `&Connection`，调用方负责加锁。

pub mod accounting;
pub mod change_log;
pub mod delivery;
pub mod dessert;
pub mod game_play;
pub mod inventory;
pub mod notification;
pub mod recipe;
pub mod sale;
pub mod sale_day;
pub mod seller;
pub mod user;

use crate::errors::DaoError;
use rusqlite::ffi;

fn extended_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.extended_code),
        _ => None,
    }
}

/// 唯一约束冲突转为业务错误，其余错误原样返回
pub(crate) fn map_unique(err: rusqlite::Error, message: &str) -> DaoError {
    if extended_code(&err) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) {
        DaoError::invalid(message)
    } else {
        DaoError::from(err)
    }
}

/// 外键约束冲突转为业务错误，其余错误原样返回
pub(crate) fn map_foreign_key(err: rusqlite::Error, message: &str) -> DaoError {
    if extended_code(&err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
        DaoError::invalid(message)
    } else {
        DaoError::from(err)
    }
}

/// 校验 YYYY-MM-DD 日期
pub(crate) fn validate_day(day: &str) -> Result<(), DaoError> {
    chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| DaoError::invalid(format!("日期格式无效: {day}")))
}
