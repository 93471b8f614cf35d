//! 卖家数据访问对象

use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seller {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub commission_rate: f64,
    pub is_archived: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSeller {
    pub name: String,
    pub phone: Option<String>,
    pub commission_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub commission_rate: Option<f64>,
    pub is_archived: Option<bool>,
}

fn from_row(row: &Row<'_>) -> Result<Seller, rusqlite::Error> {
    Ok(Seller {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        commission_rate: row.get(3)?,
        is_archived: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn validate_commission(rate: Option<f64>) -> Result<(), DaoError> {
    match rate {
        Some(rate) if !(0.0..=1.0).contains(&rate) => {
            Err(DaoError::invalid("佣金比例必须在 0 到 1 之间"))
        }
        _ => Ok(()),
    }
}

pub struct SellerDao;

impl SellerDao {
    pub fn list(conn: &Connection, include_archived: bool) -> Result<Vec<Seller>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, phone, commission_rate, is_archived, created_at
             FROM sellers
             WHERE ?1 OR is_archived = 0
             ORDER BY name COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![include_archived], from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Seller>, DaoError> {
        Ok(conn
            .query_row(
                "SELECT id, name, phone, commission_rate, is_archived, created_at
                 FROM sellers WHERE id = ?1",
                params![id],
                from_row,
            )
            .optional()?)
    }

    pub fn create(conn: &Connection, seller: &NewSeller) -> Result<Seller, DaoError> {
        validate_commission(seller.commission_rate)?;
        conn.execute(
            "INSERT INTO sellers (name, phone, commission_rate, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                seller.name.trim(),
                seller.phone.as_deref().unwrap_or("").trim(),
                seller.commission_rate.unwrap_or(0.0),
                now_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("卖家 {id}")))
    }

    pub fn update(conn: &Connection, id: i64, update: &SellerUpdate) -> Result<Seller, DaoError> {
        validate_commission(update.commission_rate)?;
        let changed = conn.execute(
            "UPDATE sellers
             SET name = COALESCE(?1, name),
                 phone = COALESCE(?2, phone),
                 commission_rate = COALESCE(?3, commission_rate),
                 is_archived = COALESCE(?4, is_archived)
             WHERE id = ?5",
            params![
                update.name.as_deref().map(str::trim),
                update.phone.as_deref().map(str::trim),
                update.commission_rate,
                update.is_archived,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("卖家 {id}")));
        }
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("卖家 {id}")))
    }

    /// 归档卖家，历史账目保留
    pub fn archive(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let changed = conn.execute(
            "UPDATE sellers SET is_archived = 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("卖家 {id}")));
        }
        Ok(())
    }
}
