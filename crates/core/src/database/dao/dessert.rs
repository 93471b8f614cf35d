//! 甜品目录数据访问对象

use super::map_unique;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dessert {
    pub id: i64,
    pub name: String,
    pub short_code: String,
    pub price: f64,
    pub sort_order: i64,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDessert {
    pub name: String,
    pub short_code: String,
    pub price: f64,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DessertUpdate {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

const SELECT_COLUMNS: &str = "id, name, short_code, price, sort_order, is_active, created_at";

fn from_row(row: &Row<'_>) -> Result<Dessert, rusqlite::Error> {
    Ok(Dessert {
        id: row.get(0)?,
        name: row.get(1)?,
        short_code: row.get(2)?,
        price: row.get(3)?,
        sort_order: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub struct DessertDao;

impl DessertDao {
    pub fn list(conn: &Connection, include_inactive: bool) -> Result<Vec<Dessert>, DaoError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM desserts
             WHERE ?1 OR is_active = 1
             ORDER BY sort_order, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![include_inactive], from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Dessert>, DaoError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM desserts WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], from_row).optional()?)
    }

    pub fn create(conn: &Connection, dessert: &NewDessert) -> Result<Dessert, DaoError> {
        if dessert.price < 0.0 {
            return Err(DaoError::invalid("价格不能为负数"));
        }
        let sort_order = match dessert.sort_order {
            Some(order) => order,
            None => conn.query_row(
                "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM desserts",
                [],
                |row| row.get(0),
            )?,
        };

        conn.execute(
            "INSERT INTO desserts (name, short_code, price, sort_order, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
            params![
                dessert.name.trim(),
                dessert.short_code.trim().to_lowercase(),
                dessert.price,
                sort_order,
                now_rfc3339(),
            ],
        )
        .map_err(|e| map_unique(e, "甜品名称或短码已存在"))?;

        let id = conn.last_insert_rowid();
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("甜品 {id}")))
    }

    pub fn update(conn: &Connection, id: i64, update: &DessertUpdate) -> Result<Dessert, DaoError> {
        if update.price.is_some_and(|p| p < 0.0) {
            return Err(DaoError::invalid("价格不能为负数"));
        }

        let changed = conn
            .execute(
                "UPDATE desserts
                 SET name = COALESCE(?1, name),
                     price = COALESCE(?2, price),
                     sort_order = COALESCE(?3, sort_order),
                     is_active = COALESCE(?4, is_active)
                 WHERE id = ?5",
                params![
                    update.name.as_deref().map(str::trim),
                    update.price,
                    update.sort_order,
                    update.is_active,
                    id,
                ],
            )
            .map_err(|e| map_unique(e, "甜品名称已存在"))?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("甜品 {id}")));
        }
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("甜品 {id}")))
    }

    /// 软删除：历史销售仍引用该甜品
    pub fn deactivate(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let changed = conn.execute(
            "UPDATE desserts SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("甜品 {id}")));
        }
        Ok(())
    }
}
