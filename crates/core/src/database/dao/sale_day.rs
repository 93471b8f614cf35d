//! 卖家日账数据访问对象
//!
//! 每个卖家每天最多一本日账，销售挂在日账下。

use super::{map_unique, seller::SellerDao, validate_day};
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleDay {
    pub id: i64,
    pub seller_id: i64,
    pub day: String,
    pub is_closed: bool,
    pub created_at: String,
    /// 当日销售笔数
    pub sales_count: i64,
    /// 当日销售总额
    pub total: f64,
}

const SELECT_DAY: &str = "SELECT d.id, d.seller_id, d.day, d.is_closed, d.created_at,
        COUNT(s.id), COALESCE(SUM(s.total), 0)
     FROM sale_days d
     LEFT JOIN sales s ON s.day_id = d.id";

fn from_row(row: &Row<'_>) -> Result<SaleDay, rusqlite::Error> {
    Ok(SaleDay {
        id: row.get(0)?,
        seller_id: row.get(1)?,
        day: row.get(2)?,
        is_closed: row.get(3)?,
        created_at: row.get(4)?,
        sales_count: row.get(5)?,
        total: row.get(6)?,
    })
}

pub struct SaleDayDao;

impl SaleDayDao {
    /// 卖家的日账，最近的在前
    pub fn list_for_seller(conn: &Connection, seller_id: i64) -> Result<Vec<SaleDay>, DaoError> {
        let sql = format!("{SELECT_DAY} WHERE d.seller_id = ?1 GROUP BY d.id ORDER BY d.day DESC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![seller_id], from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<SaleDay>, DaoError> {
        let sql = format!("{SELECT_DAY} WHERE d.id = ?1 GROUP BY d.id");
        Ok(conn.query_row(&sql, params![id], from_row).optional()?)
    }

    pub fn create(conn: &Connection, seller_id: i64, day: &str) -> Result<SaleDay, DaoError> {
        validate_day(day)?;
        if SellerDao::get(conn, seller_id)?.is_none() {
            return Err(DaoError::not_found(format!("卖家 {seller_id}")));
        }

        conn.execute(
            "INSERT INTO sale_days (seller_id, day, created_at) VALUES (?1, ?2, ?3)",
            params![seller_id, day, now_rfc3339()],
        )
        .map_err(|e| map_unique(e, &format!("卖家 {seller_id} 在 {day} 已有日账")))?;

        let id = conn.last_insert_rowid();
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("日账 {id}")))
    }

    pub fn set_closed(conn: &Connection, id: i64, closed: bool) -> Result<SaleDay, DaoError> {
        let changed = conn.execute(
            "UPDATE sale_days SET is_closed = ?1 WHERE id = ?2",
            params![closed, id],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("日账 {id}")));
        }
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("日账 {id}")))
    }

    /// 删除日账及其下所有销售
    pub fn delete(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM sale_items WHERE sale_id IN (SELECT id FROM sales WHERE day_id = ?1)",
            params![id],
        )?;
        tx.execute("DELETE FROM sales WHERE day_id = ?1", params![id])?;
        let changed = tx.execute("DELETE FROM sale_days WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("日账 {id}")));
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::dao::seller::NewSeller;
    use crate::database::dao::test_support::migrated_conn;

    fn seller(conn: &Connection) -> i64 {
        SellerDao::create(
            conn,
            &NewSeller {
                name: "Ana".to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn one_day_per_seller() {
        let conn = migrated_conn();
        let seller_id = seller(&conn);

        let day = SaleDayDao::create(&conn, seller_id, "2024-06-01").unwrap();
        assert_eq!(day.sales_count, 0);
        assert_eq!(day.total, 0.0);

        let err = SaleDayDao::create(&conn, seller_id, "2024-06-01").unwrap_err();
        assert!(matches!(err, DaoError::Invalid(_)));
    }

    #[test]
    fn unknown_seller_is_not_found() {
        let conn = migrated_conn();
        let err = SaleDayDao::create(&conn, 42, "2024-06-01").unwrap_err();
        assert!(matches!(err, DaoError::NotFound(_)));
    }

    #[test]
    fn days_are_listed_newest_first() {
        let conn = migrated_conn();
        let seller_id = seller(&conn);
        SaleDayDao::create(&conn, seller_id, "2024-06-01").unwrap();
        SaleDayDao::create(&conn, seller_id, "2024-06-03").unwrap();

        let days: Vec<String> = SaleDayDao::list_for_seller(&conn, seller_id)
            .unwrap()
            .into_iter()
            .map(|d| d.day)
            .collect();
        assert_eq!(days, vec!["2024-06-03".to_string(), "2024-06-01".to_string()]);
    }

    #[test]
    fn close_and_delete_day() {
        let conn = migrated_conn();
        let seller_id = seller(&conn);
        let day = SaleDayDao::create(&conn, seller_id, "2024-06-01").unwrap();

        assert!(SaleDayDao::set_closed(&conn, day.id, true).unwrap().is_closed);
        SaleDayDao::delete(&conn, day.id).unwrap();
        assert!(SaleDayDao::get(&conn, day.id).unwrap().is_none());
        assert!(matches!(
            SaleDayDao::delete(&conn, day.id).unwrap_err(),
            DaoError::NotFound(_)
        ));
    }
}
