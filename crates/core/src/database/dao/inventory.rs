//! 库存数据访问对象
//!
//! 库存变动与库存数量在同一事务中更新。

use super::map_unique;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub unit: String,
    pub stock: f64,
    pub min_stock: f64,
    pub ingredient_id: Option<i64>,
    /// 库存低于下限
    pub low_stock: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub unit: Option<String>,
    pub stock: Option<f64>,
    pub min_stock: Option<f64>,
    pub ingredient_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventoryItemUpdate {
    pub name: Option<String>,
    pub unit: Option<String>,
    pub min_stock: Option<f64>,
    pub ingredient_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
    /// 盘点：数量即为新的库存
    Adjust,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
            Self::Adjust => "adjust",
        }
    }
}

impl TryFrom<&str> for MovementKind {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, String> {
        match value {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            "adjust" => Ok(Self::Adjust),
            other => Err(format!("未知库存变动类型: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    pub id: i64,
    pub item_id: i64,
    pub kind: MovementKind,
    pub quantity: f64,
    pub note: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMovement {
    pub item_id: i64,
    pub kind: MovementKind,
    pub quantity: f64,
    #[serde(default)]
    pub note: String,
}

const SELECT_ITEM: &str = "SELECT id, name, unit, stock, min_stock, ingredient_id, created_at, updated_at
     FROM inventory_items";

fn item_from_row(row: &Row<'_>) -> Result<InventoryItem, rusqlite::Error> {
    let stock: f64 = row.get(3)?;
    let min_stock: f64 = row.get(4)?;
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        unit: row.get(2)?,
        stock,
        min_stock,
        ingredient_id: row.get(5)?,
        low_stock: stock < min_stock,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn movement_from_row(row: &Row<'_>) -> Result<Movement, rusqlite::Error> {
    let kind: String = row.get(2)?;
    Ok(Movement {
        id: row.get(0)?,
        item_id: row.get(1)?,
        kind: MovementKind::try_from(kind.as_str()).map_err(|_| {
            rusqlite::Error::InvalidColumnType(2, "kind".into(), rusqlite::types::Type::Text)
        })?,
        quantity: row.get(3)?,
        note: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// 计算变动后的库存
pub fn apply_movement(stock: f64, kind: MovementKind, quantity: f64) -> Result<f64, DaoError> {
    if quantity < 0.0 || (kind != MovementKind::Adjust && quantity == 0.0) {
        return Err(DaoError::invalid("变动数量必须大于 0"));
    }
    match kind {
        MovementKind::In => Ok(stock + quantity),
        MovementKind::Out if quantity > stock => Err(DaoError::invalid(format!(
            "库存不足: 现有 {stock}, 需要 {quantity}"
        ))),
        MovementKind::Out => Ok(stock - quantity),
        MovementKind::Adjust => Ok(quantity),
    }
}

pub struct InventoryDao;

impl InventoryDao {
    pub fn list(conn: &Connection) -> Result<Vec<InventoryItem>, DaoError> {
        let sql = format!("{SELECT_ITEM} ORDER BY name COLLATE NOCASE");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], item_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(conn: &Connection, id: i64) -> Result<Option<InventoryItem>, DaoError> {
        let sql = format!("{SELECT_ITEM} WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], item_from_row).optional()?)
    }

    pub fn create(conn: &Connection, item: &NewInventoryItem) -> Result<InventoryItem, DaoError> {
        let name = item.name.trim();
        if name.is_empty() {
            return Err(DaoError::invalid("库存项名称不能为空"));
        }
        if item.stock.unwrap_or(0.0) < 0.0 || item.min_stock.unwrap_or(0.0) < 0.0 {
            return Err(DaoError::invalid("库存数量不能为负数"));
        }
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO inventory_items (name, unit, stock, min_stock, ingredient_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                name,
                item.unit.as_deref().unwrap_or("unit"),
                item.stock.unwrap_or(0.0),
                item.min_stock.unwrap_or(0.0),
                item.ingredient_id,
                now,
            ],
        )
        .map_err(|e| map_unique(e, &format!("库存项 {name} 已存在")))?;
        let id = conn.last_insert_rowid();
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("库存项 {id}")))
    }

    /// 更新库存项属性；库存数量只能通过变动修改
    pub fn update(
        conn: &Connection,
        id: i64,
        update: &InventoryItemUpdate,
    ) -> Result<InventoryItem, DaoError> {
        if update.min_stock.is_some_and(|m| m < 0.0) {
            return Err(DaoError::invalid("库存下限不能为负数"));
        }
        let changed = conn
            .execute(
                "UPDATE inventory_items
                 SET name = COALESCE(?1, name),
                     unit = COALESCE(?2, unit),
                     min_stock = COALESCE(?3, min_stock),
                     ingredient_id = COALESCE(?4, ingredient_id),
                     updated_at = ?5
                 WHERE id = ?6",
                params![
                    update.name.as_deref().map(str::trim),
                    update.unit,
                    update.min_stock,
                    update.ingredient_id,
                    now_rfc3339(),
                    id,
                ],
            )
            .map_err(|e| map_unique(e, "库存项名称重复"))?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("库存项 {id}")));
        }
        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("库存项 {id}")))
    }

    pub fn record_movement(conn: &Connection, movement: &NewMovement) -> Result<InventoryItem, DaoError> {
        let tx = conn.unchecked_transaction()?;
        let stock: f64 = tx
            .query_row(
                "SELECT stock FROM inventory_items WHERE id = ?1",
                params![movement.item_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DaoError::not_found(format!("库存项 {}", movement.item_id)))?;
        let new_stock = apply_movement(stock, movement.kind, movement.quantity)?;
        let now = now_rfc3339();

        tx.execute(
            "INSERT INTO inventory_movements (item_id, kind, quantity, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![movement.item_id, movement.kind.as_str(), movement.quantity, movement.note, now],
        )?;
        tx.execute(
            "UPDATE inventory_items SET stock = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_stock, now, movement.item_id],
        )?;
        tx.commit()?;

        tracing::debug!(
            "[Inventory] 库存项 {} {} {} -> {}",
            movement.item_id,
            movement.kind.as_str(),
            movement.quantity,
            new_stock
        );
        Self::get(conn, movement.item_id)?
            .ok_or_else(|| DaoError::not_found(format!("库存项 {}", movement.item_id)))
    }

    /// 变动记录，最新的在前；`item_id` 为空时返回全部
    pub fn list_movements(
        conn: &Connection,
        item_id: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Movement>, DaoError> {
        let mut stmt = conn.prepare(
            "SELECT id, item_id, kind, quantity, note, created_at
             FROM inventory_movements
             WHERE ?1 IS NULL OR item_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![item_id, limit], movement_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
