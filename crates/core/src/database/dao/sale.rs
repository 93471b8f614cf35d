//! 销售数据访问对象
//!
//! 一笔销售由表头（sales）和明细（sale_items）组成。
//! 单价取下单时甜品的价格，之后调价不影响历史销售。

use super::change_log::ChangeLogDao;
use super::sale_day::SaleDayDao;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use crate::pricing::sale_total;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
            Self::Card => "card",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, String> {
        match value {
            "cash" => Ok(Self::Cash),
            "transfer" => Ok(Self::Transfer),
            "card" => Ok(Self::Card),
            other => Err(format!("未知付款方式: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleItem {
    pub id: i64,
    pub dessert_id: i64,
    pub dessert_name: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: i64,
    pub day_id: i64,
    pub seller_id: i64,
    pub client_name: String,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub comment: String,
    pub total: f64,
    pub receipt_no: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct NewSaleItem {
    pub dessert_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSale {
    pub day_id: i64,
    pub client_name: String,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub comment: String,
    pub items: Vec<NewSaleItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleUpdate {
    pub client_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub is_paid: Option<bool>,
    pub comment: Option<String>,
    /// 提供时整体替换明细
    pub items: Option<Vec<NewSaleItem>>,
}

/// 某日账下的销售汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySales {
    pub day_id: i64,
    pub sales: Vec<Sale>,
    pub total: f64,
    pub paid_total: f64,
}

const SELECT_SALE: &str = "SELECT s.id, s.day_id, s.seller_id, s.client_name, s.payment_method, s.is_paid,
        s.comment, s.total, r.receipt_no, s.created_at, s.updated_at
     FROM sales s
     LEFT JOIN sale_receipts r ON r.sale_id = s.id";

fn header_from_row(row: &Row<'_>) -> Result<Sale, rusqlite::Error> {
    let method_raw: String = row.get(4)?;
    let payment_method = PaymentMethod::try_from(method_raw.as_str()).map_err(|_| {
        rusqlite::Error::InvalidColumnType(4, "payment_method".into(), rusqlite::types::Type::Text)
    })?;
    Ok(Sale {
        id: row.get(0)?,
        day_id: row.get(1)?,
        seller_id: row.get(2)?,
        client_name: row.get(3)?,
        payment_method,
        is_paid: row.get(5)?,
        comment: row.get(6)?,
        total: row.get(7)?,
        receipt_no: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        items: Vec::new(),
    })
}

fn load_items(conn: &Connection, sale_id: i64) -> Result<Vec<SaleItem>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.dessert_id, d.name, i.quantity, i.unit_price
         FROM sale_items i JOIN desserts d ON d.id = i.dessert_id
         WHERE i.sale_id = ?1 ORDER BY i.id",
    )?;
    let rows = stmt.query_map(params![sale_id], |row| {
        Ok(SaleItem {
            id: row.get(0)?,
            dessert_id: row.get(1)?,
            dessert_name: row.get(2)?,
            quantity: row.get(3)?,
            unit_price: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// 校验明细并取出当前单价：返回 (甜品 ID, 数量, 单价)
fn price_items(conn: &Connection, items: &[NewSaleItem]) -> Result<Vec<(i64, i64, f64)>, DaoError> {
    if items.is_empty() {
        return Err(DaoError::invalid("销售至少需要一项明细"));
    }
    let mut priced = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(DaoError::invalid("数量必须大于 0"));
        }
        let dessert: Option<(f64, bool)> = conn
            .query_row(
                "SELECT price, is_active FROM desserts WHERE id = ?1",
                params![item.dessert_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match dessert {
            Some((price, true)) => priced.push((item.dessert_id, item.quantity, price)),
            Some((_, false)) => {
                return Err(DaoError::invalid(format!("甜品 {} 已下架", item.dessert_id)))
            }
            None => return Err(DaoError::not_found(format!("甜品 {}", item.dessert_id))),
        }
    }
    Ok(priced)
}

fn insert_items(conn: &Connection, sale_id: i64, priced: &[(i64, i64, f64)], now: &str) -> Result<(), rusqlite::Error> {
    for (dessert_id, quantity, price) in priced {
        conn.execute(
            "INSERT INTO sale_items (sale_id, dessert_id, quantity, unit_price, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sale_id, dessert_id, quantity, price, now],
        )?;
    }
    Ok(())
}

fn priced_total(priced: &[(i64, i64, f64)]) -> f64 {
    let lines: Vec<(i64, f64)> = priced.iter().map(|(_, q, p)| (*q, *p)).collect();
    sale_total(&lines)
}

pub struct SaleDao;

impl SaleDao {
    pub fn get(conn: &Connection, id: i64) -> Result<Option<Sale>, DaoError> {
        let sql = format!("{SELECT_SALE} WHERE s.id = ?1");
        let sale = conn.query_row(&sql, params![id], header_from_row).optional()?;
        match sale {
            Some(mut sale) => {
                sale.items = load_items(conn, sale.id)?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    pub fn list_for_day(conn: &Connection, day_id: i64) -> Result<DaySales, DaoError> {
        let sql = format!("{SELECT_SALE} WHERE s.day_id = ?1 ORDER BY s.id");
        let mut stmt = conn.prepare(&sql)?;
        let mut sales = stmt
            .query_map(params![day_id], header_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for sale in &mut sales {
            sale.items = load_items(conn, sale.id)?;
        }

        let total = crate::pricing::round_money(sales.iter().map(|s| s.total).sum());
        let paid_total = crate::pricing::round_money(
            sales.iter().filter(|s| s.is_paid).map(|s| s.total).sum(),
        );
        Ok(DaySales {
            day_id,
            sales,
            total,
            paid_total,
        })
    }

    /// 创建销售：表头、明细、收据号与日志在同一事务中写入
    pub fn create(conn: &Connection, sale: &NewSale, actor_role: &str) -> Result<Sale, DaoError> {
        let day = SaleDayDao::get(conn, sale.day_id)?
            .ok_or_else(|| DaoError::not_found(format!("日账 {}", sale.day_id)))?;
        if day.is_closed {
            return Err(DaoError::invalid(format!("日账 {} 已结账", day.id)));
        }
        let priced = price_items(conn, &sale.items)?;
        let total = priced_total(&priced);
        let now = now_rfc3339();

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sales (day_id, seller_id, client_name, payment_method, is_paid, comment,
                                total, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                day.id,
                day.seller_id,
                sale.client_name.trim(),
                sale.payment_method.as_str(),
                sale.is_paid,
                sale.comment,
                total,
                now,
            ],
        )?;
        let sale_id = tx.last_insert_rowid();
        insert_items(&tx, sale_id, &priced, &now)?;
        tx.execute(
            "INSERT INTO sale_receipts (sale_id, receipt_no, created_at) VALUES (?1, ?2, ?3)",
            params![sale_id, Uuid::new_v4().simple().to_string(), now],
        )?;
        ChangeLogDao::record(&tx, Some(sale_id), actor_role, "create", &json!({ "total": total }))?;
        tx.commit()?;

        tracing::info!("[Sales] 新增销售 {} (日账 {}), 金额 {}", sale_id, day.id, total);
        Self::get(conn, sale_id)?.ok_or_else(|| DaoError::not_found(format!("销售 {sale_id}")))
    }

    pub fn update(
        conn: &Connection,
        id: i64,
        update: &SaleUpdate,
        actor_role: &str,
    ) -> Result<Sale, DaoError> {
        let before = Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("销售 {id}")))?;
        let priced = update
            .items
            .as_deref()
            .map(|items| price_items(conn, items))
            .transpose()?;
        let total = priced.as_deref().map(priced_total).unwrap_or(before.total);
        let now = now_rfc3339();

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE sales
             SET client_name = COALESCE(?1, client_name),
                 payment_method = COALESCE(?2, payment_method),
                 is_paid = COALESCE(?3, is_paid),
                 comment = COALESCE(?4, comment),
                 total = ?5,
                 updated_at = ?6
             WHERE id = ?7",
            params![
                update.client_name.as_deref().map(str::trim),
                update.payment_method.map(|m| m.as_str()),
                update.is_paid,
                update.comment,
                total,
                now,
                id,
            ],
        )?;
        if let Some(priced) = &priced {
            tx.execute("DELETE FROM sale_items WHERE sale_id = ?1", params![id])?;
            insert_items(&tx, id, priced, &now)?;
        }
        ChangeLogDao::record(
            &tx,
            Some(id),
            actor_role,
            "update",
            &json!({
                "before_total": before.total,
                "after_total": total,
                "items_replaced": priced.is_some(),
            }),
        )?;
        tx.commit()?;

        Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("销售 {id}")))
    }

    pub fn delete(conn: &Connection, id: i64, actor_role: &str) -> Result<(), DaoError> {
        let before = Self::get(conn, id)?.ok_or_else(|| DaoError::not_found(format!("销售 {id}")))?;

        let tx = conn.unchecked_transaction()?;
        ChangeLogDao::record(
            &tx,
            Some(id),
            actor_role,
            "delete",
            &serde_json::to_value(&before).unwrap_or_default(),
        )?;
        tx.execute("DELETE FROM sale_items WHERE sale_id = ?1", params![id])?;
        tx.execute("DELETE FROM sale_receipts WHERE sale_id = ?1", params![id])?;
        tx.execute("DELETE FROM sales WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!("[Sales] 删除销售 {}", id);
        Ok(())
    }
}
