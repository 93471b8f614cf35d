//! 销售明细回填
//!
//! 旧版 sales 表用宽列（qty_arco, qty_melo ...）记录数量，
//! 新版改为 sale_items 明细行。这里把尚无明细的销售拆成明细：
//! 1. 查出没有任何 sale_items 且至少一个宽列大于 0 的销售
//! 2. 按短码找到甜品 ID 与当前单价
//! 3. 每笔销售在单独事务中写入明细
//!
//! 已有明细的销售不会再被处理，因此每次冷启动重复执行都是安全的。
//!
//! 另外，旧版 game_plays 没有唯一约束，同一手机号同一天可能有多条记录；
//! 建唯一索引前先去重，只保留最早的一条。

use super::now_rfc3339;
use super::schema::LEGACY_QUANTITY_COLUMNS;
use rusqlite::{params, Connection, OptionalExtension};

/// 回填统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillStats {
    /// 处理的销售数
    pub sales_migrated: usize,
    /// 写入的明细行数
    pub items_created: usize,
    /// 找不到对应甜品而跳过的短码
    pub missing_codes: Vec<String>,
}

struct LegacySale {
    id: i64,
    quantities: Vec<(String, i64)>,
}

/// 执行回填
pub fn backfill_sale_items(conn: &Connection) -> Result<BackfillStats, rusqlite::Error> {
    let pending = load_pending_sales(conn)?;
    if pending.is_empty() {
        tracing::debug!("[Backfill] 没有需要回填的销售");
        return Ok(BackfillStats::default());
    }

    tracing::info!("[Backfill] 发现 {} 笔需要回填的销售", pending.len());

    let mut stats = BackfillStats::default();
    let now = now_rfc3339();

    for sale in pending {
        let tx = conn.unchecked_transaction()?;
        let mut created = 0;
        for (code, quantity) in &sale.quantities {
            let dessert: Option<(i64, f64)> = tx
                .query_row(
                    "SELECT id, price FROM desserts WHERE short_code = ?1",
                    params![code],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((dessert_id, price)) = dessert else {
                if !stats.missing_codes.contains(code) {
                    stats.missing_codes.push(code.clone());
                }
                continue;
            };

            tx.execute(
                "INSERT INTO sale_items (sale_id, dessert_id, quantity, unit_price, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![sale.id, dessert_id, quantity, price, now],
            )?;
            created += 1;
        }
        tx.commit()?;

        if created > 0 {
            stats.sales_migrated += 1;
            stats.items_created += created;
        }
    }

    if !stats.missing_codes.is_empty() {
        tracing::warn!(
            "[Backfill] 以下短码没有对应甜品，已跳过: {:?}",
            stats.missing_codes
        );
    }
    tracing::info!(
        "[Backfill] 回填完成: 销售 {} 笔, 明细 {} 行",
        stats.sales_migrated,
        stats.items_created
    );
    Ok(stats)
}

/// 删除同一手机号同一天的重复抽奖记录（保留 id 最小的一条），返回删除行数
pub fn dedupe_game_plays(conn: &Connection) -> Result<usize, rusqlite::Error> {
    let removed = conn.execute(
        "DELETE FROM game_plays
         WHERE id NOT IN (SELECT MIN(id) FROM game_plays GROUP BY phone, play_day)",
        [],
    )?;
    if removed > 0 {
        tracing::warn!("[Backfill] 删除了 {} 条重复的抽奖记录", removed);
    }
    Ok(removed)
}

fn load_pending_sales(conn: &Connection) -> Result<Vec<LegacySale>, rusqlite::Error> {
    let columns: Vec<&str> = LEGACY_QUANTITY_COLUMNS.iter().map(|(c, _)| *c).collect();
    let any_positive = columns
        .iter()
        .map(|c| format!("s.{c} > 0"))
        .collect::<Vec<_>>()
        .join(" OR ");
    let sql = format!(
        "SELECT s.id, {} FROM sales s
         WHERE NOT EXISTS (SELECT 1 FROM sale_items i WHERE i.sale_id = s.id)
           AND ({any_positive})
         ORDER BY s.id",
        columns
            .iter()
            .map(|c| format!("s.{c}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let mut quantities = Vec::new();
        for (idx, (_, code)) in LEGACY_QUANTITY_COLUMNS.iter().enumerate() {
            let quantity: i64 = row.get(idx + 1)?;
            if quantity > 0 {
                quantities.push((code.to_string(), quantity));
            }
        }
        Ok(LegacySale {
            id: row.get(0)?,
            quantities,
        })
    })?;

    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::create_tables;
    use crate::database::seed::seed_desserts;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("创建内存数据库失败");
        create_tables(&conn).expect("创建表结构失败");
        seed_desserts(&conn).expect("写入默认甜品失败");
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO sellers (name, created_at) VALUES ('Ana', ?1)",
            params![now],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO sale_days (seller_id, day, created_at) VALUES (1, '2024-05-01', ?1)",
            params![now],
        )
        .unwrap();
        conn
    }

    fn insert_legacy_sale(conn: &Connection, arco: i64, oreo: i64) -> i64 {
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO sales (day_id, seller_id, qty_arco, qty_oreo, created_at, updated_at)
             VALUES (1, 1, ?1, ?2, ?3, ?3)",
            params![arco, oreo, now],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    fn item_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM sale_items", [], |row| row.get(0))
            .unwrap()
    }

    fn insert_play(conn: &Connection, phone: &str, day: &str, prize: &str) {
        conn.execute(
            "INSERT INTO game_plays (phone, play_day, prize, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![phone, day, prize, now_rfc3339()],
        )
        .unwrap();
    }

    #[test]
    fn duplicate_plays_keep_the_earliest_row() {
        let conn = setup_conn();
        insert_play(&conn, "5511999990000", "2024-05-01", "cookie");
        insert_play(&conn, "5511999990000", "2024-05-01", "brownie");
        insert_play(&conn, "5511999990000", "2024-05-02", "none");
        insert_play(&conn, "5511888880000", "2024-05-01", "none");

        assert_eq!(dedupe_game_plays(&conn).unwrap(), 1);
        assert_eq!(dedupe_game_plays(&conn).unwrap(), 0);

        let prize: String = conn
            .query_row(
                "SELECT prize FROM game_plays WHERE phone = '5511999990000' AND play_day = '2024-05-01'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(prize, "cookie");
        let total: i64 = conn
            .query_row("SELECT COUNT(*) FROM game_plays", [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 3);
    }

    #[test]
    fn migrates_wide_columns_into_items() {
        let conn = setup_conn();
        let sale_id = insert_legacy_sale(&conn, 2, 1);

        let stats = backfill_sale_items(&conn).unwrap();
        assert_eq!(stats.sales_migrated, 1);
        assert_eq!(stats.items_created, 2);

        let oreo_qty: i64 = conn
            .query_row(
                "SELECT i.quantity FROM sale_items i JOIN desserts d ON d.id = i.dessert_id
                 WHERE i.sale_id = ?1 AND d.short_code = 'oreo'",
                params![sale_id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(oreo_qty, 1);
    }

    #[test]
    fn running_twice_does_not_duplicate_items() {
        let conn = setup_conn();
        insert_legacy_sale(&conn, 3, 0);
        insert_legacy_sale(&conn, 0, 4);

        backfill_sale_items(&conn).unwrap();
        let after_first = item_count(&conn);
        let second = backfill_sale_items(&conn).unwrap();

        assert_eq!(after_first, 2);
        assert_eq!(second, BackfillStats::default());
        assert_eq!(item_count(&conn), after_first);
    }

    #[test]
    fn sales_with_items_are_untouched() {
        let conn = setup_conn();
        let sale_id = insert_legacy_sale(&conn, 5, 0);
        conn.execute(
            "INSERT INTO sale_items (sale_id, dessert_id, quantity, unit_price, created_at)
             VALUES (?1, 2, 1, 9, ?2)",
            params![sale_id, now_rfc3339()],
        )
        .unwrap();

        let stats = backfill_sale_items(&conn).unwrap();
        assert_eq!(stats.sales_migrated, 0);
        assert_eq!(item_count(&conn), 1);
    }

    #[test]
    fn unknown_codes_are_reported() {
        let conn = setup_conn();
        conn.execute("DELETE FROM desserts WHERE short_code = 'oreo'", [])
            .unwrap();
        insert_legacy_sale(&conn, 1, 1);

        let stats = backfill_sale_items(&conn).unwrap();
        assert_eq!(stats.items_created, 1);
        assert_eq!(stats.missing_codes, vec!["oreo".to_string()]);
    }
}
