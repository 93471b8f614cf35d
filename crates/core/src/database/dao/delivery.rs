//! 配送数据访问对象
//!
//! 一次配送包含每种甜品的出货数量，以及分给各卖家的数量。
//! 分配给卖家的合计不能超过该甜品的出货数量。

use super::validate_day;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryItem {
    pub dessert_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SellerAllocation {
    pub seller_id: i64,
    pub dessert_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delivery {
    pub id: i64,
    pub day: String,
    pub note: String,
    pub created_at: String,
    pub items: Vec<DeliveryItem>,
    pub allocations: Vec<SellerAllocation>,
    pub production_user_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDelivery {
    pub day: String,
    #[serde(default)]
    pub note: String,
    pub items: Vec<DeliveryItem>,
    #[serde(default)]
    pub allocations: Vec<SellerAllocation>,
    #[serde(default)]
    pub production_user_ids: Vec<i64>,
}

/// 校验出货与分配
pub fn validate_allocations(
    items: &[DeliveryItem],
    allocations: &[SellerAllocation],
) -> Result<(), DaoError> {
    if items.is_empty() {
        return Err(DaoError::invalid("配送至少需要一项甜品"));
    }
    let mut delivered: HashMap<i64, i64> = HashMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(DaoError::invalid("出货数量必须大于 0"));
        }
        *delivered.entry(item.dessert_id).or_insert(0) += item.quantity;
    }

    let mut allocated: HashMap<i64, i64> = HashMap::new();
    for allocation in allocations {
        if allocation.quantity <= 0 {
            return Err(DaoError::invalid("分配数量必须大于 0"));
        }
        *allocated.entry(allocation.dessert_id).or_insert(0) += allocation.quantity;
    }
    for (dessert_id, quantity) in allocated {
        let available = delivered.get(&dessert_id).copied().unwrap_or(0);
        if quantity > available {
            return Err(DaoError::invalid(format!(
                "甜品 {dessert_id} 分配 {quantity} 超过出货 {available}"
            )));
        }
    }
    Ok(())
}

pub struct DeliveryDao;

impl DeliveryDao {
    pub fn list(conn: &Connection, limit: u32) -> Result<Vec<Delivery>, DaoError> {
        let ids: Vec<i64> = {
            let mut stmt =
                conn.prepare("SELECT id FROM deliveries ORDER BY day DESC, id DESC LIMIT ?1")?;
            let rows = stmt.query_map(params![limit], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        let mut deliveries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(delivery) = Self::get(conn, id)? {
                deliveries.push(delivery);
            }
        }
        Ok(deliveries)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<Delivery>, DaoError> {
        let header: Option<(String, String, String)> = conn
            .query_row(
                "SELECT day, note, created_at FROM deliveries WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((day, note, created_at)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT dessert_id, quantity FROM delivery_items WHERE delivery_id = ?1 ORDER BY id",
        )?;
        let items = stmt
            .query_map(params![id], |row| {
                Ok(DeliveryItem {
                    dessert_id: row.get(0)?,
                    quantity: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT seller_id, dessert_id, quantity FROM delivery_seller_items
             WHERE delivery_id = ?1 ORDER BY id",
        )?;
        let allocations = stmt
            .query_map(params![id], |row| {
                Ok(SellerAllocation {
                    seller_id: row.get(0)?,
                    dessert_id: row.get(1)?,
                    quantity: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT user_id FROM delivery_production_users WHERE delivery_id = ?1 ORDER BY user_id",
        )?;
        let production_user_ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        Ok(Some(Delivery {
            id,
            day,
            note,
            created_at,
            items,
            allocations,
            production_user_ids,
        }))
    }

    pub fn create(conn: &Connection, delivery: &NewDelivery) -> Result<Delivery, DaoError> {
        validate_day(&delivery.day)?;
        validate_allocations(&delivery.items, &delivery.allocations)?;

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO deliveries (day, note, created_at) VALUES (?1, ?2, ?3)",
            params![delivery.day, delivery.note, now_rfc3339()],
        )?;
        let delivery_id = tx.last_insert_rowid();
        for item in &delivery.items {
            tx.execute(
                "INSERT INTO delivery_items (delivery_id, dessert_id, quantity) VALUES (?1, ?2, ?3)",
                params![delivery_id, item.dessert_id, item.quantity],
            )
            .map_err(|e| super::map_foreign_key(e, &format!("甜品 {} 不存在", item.dessert_id)))?;
        }
        for allocation in &delivery.allocations {
            tx.execute(
                "INSERT INTO delivery_seller_items (delivery_id, seller_id, dessert_id, quantity)
                 VALUES (?1, ?2, ?3, ?4)",
                params![delivery_id, allocation.seller_id, allocation.dessert_id, allocation.quantity],
            )
            .map_err(|e| super::map_foreign_key(e, &format!("卖家 {} 不存在", allocation.seller_id)))?;
        }
        for user_id in &delivery.production_user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO delivery_production_users (delivery_id, user_id) VALUES (?1, ?2)",
                params![delivery_id, user_id],
            )
            .map_err(|e| super::map_foreign_key(e, &format!("用户 {user_id} 不存在")))?;
        }
        tx.commit()?;

        tracing::info!("[Deliveries] 新增配送 {} ({})", delivery_id, delivery.day);
        Self::get(conn, delivery_id)?
            .ok_or_else(|| DaoError::not_found(format!("配送 {delivery_id}")))
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let changed = conn.execute("DELETE FROM deliveries WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("配送 {id}")));
        }
        Ok(())
    }
}
