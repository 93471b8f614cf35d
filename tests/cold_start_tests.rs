//! 冷启动测试：磁盘上的 SQLite 文件，模拟多次进程重启

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;
use sweetpos_core::database::open_connection;
use sweetpos_core::database::schema::TARGET_VERSION;
use sweetpos_core::database::version::read_version;
use sweetpos_core::{Config, SchemaGate};
use sweetpos_server::{create_router, AppState};
use tempfile::TempDir;
use tower::ServiceExt;

fn config_for(path: &Path) -> Config {
    let vars: HashMap<String, String> = [(
        "DATABASE_URL".to_string(),
        format!("sqlite://{}", path.display()),
    )]
    .into();
    Config::from_vars(&vars).unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[tokio::test]
async fn second_cold_start_runs_no_gated_ddl() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sweetpos.db");
    let config = config_for(&path);

    // 第一次启动：全新数据库
    let db = open_connection(&config.database_url).unwrap();
    let gate = SchemaGate::new(db.clone());
    gate.ensure_schema().await.unwrap();
    assert!(gate.metrics().gated_ddl.get() > 0);
    {
        let conn = db.lock().unwrap();
        assert_eq!(read_version(&conn).unwrap(), TARGET_VERSION);
        assert_eq!(count(&conn, "desserts"), 5);
        assert_eq!(count(&conn, "users"), 3);
    }
    drop(gate);
    drop(db);

    // 第二次启动：新连接、新 Gate
    let db = open_connection(&config.database_url).unwrap();
    let gate = SchemaGate::new(db.clone());
    gate.ensure_schema().await.unwrap();
    assert_eq!(gate.metrics().gated_ddl.get(), 0);
    assert_eq!(gate.metrics().slow_path_runs.load(Ordering::SeqCst), 0);
    let report = gate.last_report().unwrap();
    assert!(!report.ran_slow_path());
    assert!(report.prelude_statements > 0);

    let conn = db.lock().unwrap();
    assert_eq!(count(&conn, "desserts"), 5);
    assert_eq!(count(&conn, "users"), 3);
}

/// 旧版数据库：版本 1，desserts 没有 sort_order，sales 只有宽列
fn create_legacy_database(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE schema_version (
             id INTEGER PRIMARY KEY CHECK (id = 1),
             version INTEGER NOT NULL DEFAULT 0,
             updated_at TEXT NOT NULL
         );
         INSERT INTO schema_version (id, version, updated_at) VALUES (1, 1, '2023-01-01T00:00:00Z');
         CREATE TABLE sellers (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             name TEXT NOT NULL,
             phone TEXT NOT NULL DEFAULT '',
             created_at TEXT NOT NULL
         );
         CREATE TABLE desserts (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             name TEXT NOT NULL UNIQUE,
             short_code TEXT NOT NULL UNIQUE,
             price REAL NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL
         );
         CREATE TABLE sale_days (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             seller_id INTEGER NOT NULL REFERENCES sellers(id) ON DELETE CASCADE,
             day TEXT NOT NULL,
             created_at TEXT NOT NULL,
             UNIQUE (seller_id, day)
         );
         CREATE TABLE sales (
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
         );",
    )
    .unwrap();

    let now = "2023-05-01T12:00:00Z";
    conn.execute(
        "INSERT INTO desserts (name, short_code, price, created_at) VALUES ('Arcoíris', 'arco', 8.0, ?1)",
        params![now],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO desserts (name, short_code, price, created_at) VALUES ('Oreo', 'oreo', 9.5, ?1)",
        params![now],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO sellers (name, created_at) VALUES ('Ana', ?1)",
        params![now],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO sale_days (seller_id, day, created_at) VALUES (1, '2023-05-01', ?1)",
        params![now],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO sales (day_id, seller_id, client_name, qty_arco, qty_oreo, total, created_at, updated_at)
         VALUES (1, 1, 'Carla', 2, 1, 25.5, ?1, ?1)",
        params![now],
    )
    .unwrap();
}

#[tokio::test]
async fn legacy_database_is_upgraded_on_first_request() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.db");
    create_legacy_database(&path);

    let config = config_for(&path);
    let db = open_connection(&config.database_url).unwrap();
    let state = AppState::new(db.clone(), config);
    let app = create_router(state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/sales?day_id=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    let sale = &body["sales"][0];
    assert_eq!(sale["payment_method"], "cash");
    let items = sale["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["dessert_name"], "Arcoíris");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["unit_price"], 8.0);

    let report = state.gate.last_report().unwrap();
    assert_eq!(report.from_version, 1);
    assert_eq!(report.to_version, TARGET_VERSION);
    assert_eq!(report.migrated_rows, 2);

    let conn = db.lock().unwrap();
    assert_eq!(read_version(&conn).unwrap(), TARGET_VERSION);
    // desserts 非空，不补默认甜品
    assert_eq!(count(&conn, "desserts"), 2);
    assert_eq!(count(&conn, "users"), 3);
}
