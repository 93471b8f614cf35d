//! 数据库表结构定义
//!
//! 表按依赖顺序排列。`TABLES` 只描述每张表最初的形状，
//! 后续版本新增的列统一放在 `COLUMNS`，由 Schema Gate 按需 `ALTER TABLE`。

use rusqlite::{params, Connection};

/// 当前代码期望的结构版本
pub const TARGET_VERSION: i64 = 9;

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub sql: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub table: &'static str,
    pub column: &'static str,
    pub definition: &'static str,
    /// 引入该列的版本
    pub since: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    pub sql: &'static str,
}

/// 旧版 sales 宽表上的数量列 -> 甜品短码
pub const LEGACY_QUANTITY_COLUMNS: &[(&str, &str)] = &[
    ("qty_arco", "arco"),
    ("qty_melo", "melo"),
    ("qty_mara", "mara"),
    ("qty_oreo", "oreo"),
    ("qty_nute", "nute"),
];

// ============================================================================
// 每次冷启动都会确保存在的表（在版本检查之前执行）
// ============================================================================

pub const PRELUDE_TABLES: &[TableDef] = &[
    TableDef {
        name: "schema_version",
        sql: "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "game_plays",
        sql: "CREATE TABLE IF NOT EXISTS game_plays (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_name TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL,
            prize TEXT NOT NULL,
            play_day TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "purchases",
        sql: "CREATE TABLE IF NOT EXISTS purchases (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            supplier TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            amount REAL NOT NULL DEFAULT 0,
            purchase_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
];

// ============================================================================
// 业务表（版本门控）
// ============================================================================

pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "sellers",
        sql: "CREATE TABLE IF NOT EXISTS sellers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "users",
        sql: "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'seller',
            seller_id INTEGER REFERENCES sellers(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "user_view_permissions",
        sql: "CREATE TABLE IF NOT EXISTS user_view_permissions (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            view_key TEXT NOT NULL,
            PRIMARY KEY (user_id, view_key)
        )",
    },
    TableDef {
        name: "user_feature_permissions",
        sql: "CREATE TABLE IF NOT EXISTS user_feature_permissions (
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            feature_key TEXT NOT NULL,
            PRIMARY KEY (user_id, feature_key)
        )",
    },
    TableDef {
        name: "desserts",
        sql: "CREATE TABLE IF NOT EXISTS desserts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            short_code TEXT NOT NULL UNIQUE,
            price REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "sale_days",
        sql: "CREATE TABLE IF NOT EXISTS sale_days (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            seller_id INTEGER NOT NULL REFERENCES sellers(id) ON DELETE CASCADE,
            day TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (seller_id, day)
        )",
    },
    TableDef {
        name: "sales",
        sql: "CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day_id INTEGER NOT NULL REFERENCES sale_days(id) ON DELETE CASCADE,
            seller_id INTEGER NOT NULL REFERENCES sellers(id),
            client_name TEXT NOT NULL DEFAULT '',
            qty_arco INTEGER NOT NULL DEFAULT 0,
            qty_melo INTEGER NOT NULL DEFAULT 0,
            qty_mara INTEGER NOT NULL DEFAULT 0,
            qty_oreo INTEGER NOT NULL DEFAULT 0,
            qty_nute INTEGER NOT NULL DEFAULT 0,
            total REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "sale_items",
        sql: "CREATE TABLE IF NOT EXISTS sale_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sale_id INTEGER NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
            dessert_id INTEGER NOT NULL REFERENCES desserts(id),
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "change_logs",
        sql: "CREATE TABLE IF NOT EXISTS change_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sale_id INTEGER,
            actor_role TEXT NOT NULL DEFAULT '',
            action TEXT NOT NULL,
            details TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "sale_receipts",
        sql: "CREATE TABLE IF NOT EXISTS sale_receipts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sale_id INTEGER NOT NULL REFERENCES sales(id) ON DELETE CASCADE,
            receipt_no TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "deliveries",
        sql: "CREATE TABLE IF NOT EXISTS deliveries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            day TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "delivery_items",
        sql: "CREATE TABLE IF NOT EXISTS delivery_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            delivery_id INTEGER NOT NULL REFERENCES deliveries(id) ON DELETE CASCADE,
            dessert_id INTEGER NOT NULL REFERENCES desserts(id),
            quantity INTEGER NOT NULL
        )",
    },
    TableDef {
        name: "delivery_seller_items",
        sql: "CREATE TABLE IF NOT EXISTS delivery_seller_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            delivery_id INTEGER NOT NULL REFERENCES deliveries(id) ON DELETE CASCADE,
            seller_id INTEGER NOT NULL REFERENCES sellers(id),
            dessert_id INTEGER NOT NULL REFERENCES desserts(id),
            quantity INTEGER NOT NULL
        )",
    },
    TableDef {
        name: "delivery_production_users",
        sql: "CREATE TABLE IF NOT EXISTS delivery_production_users (
            delivery_id INTEGER NOT NULL REFERENCES deliveries(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (delivery_id, user_id)
        )",
    },
    TableDef {
        name: "notifications",
        sql: "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            body TEXT NOT NULL DEFAULT '',
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "accounting_entries",
        sql: "CREATE TABLE IF NOT EXISTS accounting_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
            amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            entry_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "ingredient_formulas",
        sql: "CREATE TABLE IF NOT EXISTS ingredient_formulas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            unit TEXT NOT NULL DEFAULT 'g',
            unit_cost REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "dessert_recipes",
        sql: "CREATE TABLE IF NOT EXISTS dessert_recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dessert_id INTEGER NOT NULL REFERENCES desserts(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            yield_units REAL NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "dessert_recipe_items",
        sql: "CREATE TABLE IF NOT EXISTS dessert_recipe_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL REFERENCES dessert_recipes(id) ON DELETE CASCADE,
            ingredient_id INTEGER NOT NULL REFERENCES ingredient_formulas(id),
            quantity REAL NOT NULL
        )",
    },
    TableDef {
        name: "extras_items",
        sql: "CREATE TABLE IF NOT EXISTS extras_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL REFERENCES dessert_recipes(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            cost REAL NOT NULL DEFAULT 0
        )",
    },
    TableDef {
        name: "recipe_sessions",
        sql: "CREATE TABLE IF NOT EXISTS recipe_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipe_id INTEGER NOT NULL REFERENCES dessert_recipes(id) ON DELETE CASCADE,
            batches REAL NOT NULL,
            produced_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "recipe_production_users",
        sql: "CREATE TABLE IF NOT EXISTS recipe_production_users (
            session_id INTEGER NOT NULL REFERENCES recipe_sessions(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (session_id, user_id)
        )",
    },
    TableDef {
        name: "inventory_items",
        sql: "CREATE TABLE IF NOT EXISTS inventory_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            unit TEXT NOT NULL DEFAULT 'unit',
            stock REAL NOT NULL DEFAULT 0,
            min_stock REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "inventory_movements",
        sql: "CREATE TABLE IF NOT EXISTS inventory_movements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES inventory_items(id) ON DELETE CASCADE,
            kind TEXT NOT NULL CHECK (kind IN ('in', 'out', 'adjust')),
            quantity REAL NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
    },
    TableDef {
        name: "time_sessions",
        sql: "CREATE TABLE IF NOT EXISTS time_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )",
    },
];

// ============================================================================
// 后续版本新增的列
// ============================================================================

pub const COLUMNS: &[ColumnDef] = &[
    ColumnDef {
        table: "desserts",
        column: "sort_order",
        definition: "INTEGER NOT NULL DEFAULT 0",
        since: 2,
    },
    ColumnDef {
        table: "desserts",
        column: "is_active",
        definition: "INTEGER NOT NULL DEFAULT 1",
        since: 2,
    },
    ColumnDef {
        table: "sales",
        column: "payment_method",
        definition: "TEXT NOT NULL DEFAULT 'cash'",
        since: 3,
    },
    ColumnDef {
        table: "sales",
        column: "is_paid",
        definition: "INTEGER NOT NULL DEFAULT 0",
        since: 3,
    },
    ColumnDef {
        table: "sellers",
        column: "commission_rate",
        definition: "REAL NOT NULL DEFAULT 0",
        since: 3,
    },
    ColumnDef {
        table: "sale_days",
        column: "is_closed",
        definition: "INTEGER NOT NULL DEFAULT 0",
        since: 4,
    },
    ColumnDef {
        table: "users",
        column: "is_active",
        definition: "INTEGER NOT NULL DEFAULT 1",
        since: 5,
    },
    ColumnDef {
        table: "sellers",
        column: "is_archived",
        definition: "INTEGER NOT NULL DEFAULT 0",
        since: 6,
    },
    ColumnDef {
        table: "sales",
        column: "comment",
        definition: "TEXT NOT NULL DEFAULT ''",
        since: 7,
    },
    ColumnDef {
        table: "accounting_entries",
        column: "category",
        definition: "TEXT NOT NULL DEFAULT 'general'",
        since: 8,
    },
    ColumnDef {
        table: "inventory_items",
        column: "ingredient_id",
        definition: "INTEGER REFERENCES ingredient_formulas(id)",
        since: 9,
    },
];

// ============================================================================
// 索引
// ============================================================================

pub const INDEXES: &[IndexDef] = &[
    IndexDef {
        name: "idx_sales_day",
        sql: "CREATE INDEX IF NOT EXISTS idx_sales_day ON sales(day_id)",
    },
    IndexDef {
        name: "idx_sales_seller",
        sql: "CREATE INDEX IF NOT EXISTS idx_sales_seller ON sales(seller_id)",
    },
    IndexDef {
        name: "idx_sale_items_sale",
        sql: "CREATE INDEX IF NOT EXISTS idx_sale_items_sale ON sale_items(sale_id)",
    },
    IndexDef {
        name: "idx_sale_days_seller_day",
        sql: "CREATE INDEX IF NOT EXISTS idx_sale_days_seller_day ON sale_days(seller_id, day)",
    },
    IndexDef {
        name: "idx_change_logs_sale",
        sql: "CREATE INDEX IF NOT EXISTS idx_change_logs_sale ON change_logs(sale_id)",
    },
    IndexDef {
        name: "idx_delivery_items_delivery",
        sql: "CREATE INDEX IF NOT EXISTS idx_delivery_items_delivery ON delivery_items(delivery_id)",
    },
    IndexDef {
        name: "idx_delivery_seller_items_delivery",
        sql: "CREATE INDEX IF NOT EXISTS idx_delivery_seller_items_delivery ON delivery_seller_items(delivery_id)",
    },
    IndexDef {
        name: "idx_inventory_movements_item",
        sql: "CREATE INDEX IF NOT EXISTS idx_inventory_movements_item ON inventory_movements(item_id, created_at)",
    },
    IndexDef {
        name: "idx_notifications_user_read",
        sql: "CREATE INDEX IF NOT EXISTS idx_notifications_user_read ON notifications(user_id, is_read)",
    },
    IndexDef {
        name: "idx_accounting_entries_date",
        sql: "CREATE INDEX IF NOT EXISTS idx_accounting_entries_date ON accounting_entries(entry_date)",
    },
    IndexDef {
        name: "idx_dessert_recipe_items_recipe",
        sql: "CREATE INDEX IF NOT EXISTS idx_dessert_recipe_items_recipe ON dessert_recipe_items(recipe_id)",
    },
    IndexDef {
        name: "idx_game_plays_phone_day",
        sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_game_plays_phone_day ON game_plays(phone, play_day)",
    },
];

/// 检查表是否存在
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )
}

/// 通过 `pragma_table_info` 检查列是否存在
pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2)",
        params![table, column],
        |row| row.get(0),
    )
}

/// 直接创建全部结构（不含种子数据和版本号），供 DAO 单元测试使用
pub fn create_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    for table in PRELUDE_TABLES.iter().chain(TABLES) {
        conn.execute(table.sql, [])?;
    }
    for column in COLUMNS {
        if !column_exists(conn, column.table, column.column)? {
            conn.execute(
                &format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    column.table, column.column, column.definition
                ),
                [],
            )?;
        }
    }
    for index in INDEXES {
        conn.execute(index.sql, [])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provisioned_table_is_defined_once() {
        let mut names: Vec<&str> = PRELUDE_TABLES
            .iter()
            .chain(TABLES)
            .map(|t| t.name)
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        // 27 张业务表 + schema_version
        assert_eq!(total, 28);
    }

    #[test]
    fn column_versions_do_not_exceed_target() {
        assert!(COLUMNS.iter().all(|c| c.since >= 2 && c.since <= TARGET_VERSION));
    }

    #[test]
    fn create_tables_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
        assert!(table_exists(&conn, "sale_items").unwrap());
        assert!(column_exists(&conn, "sales", "payment_method").unwrap());
        assert!(!column_exists(&conn, "sales", "nonexistent").unwrap());
    }
}
