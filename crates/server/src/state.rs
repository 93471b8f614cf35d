//! 应用状态

use crate::error::{ApiError, ApiResult};
use rusqlite::Connection;
use std::sync::Arc;
use sweetpos_core::{Config, DaoError, DbConnection, SchemaGate};

#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub gate: SchemaGate,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbConnection, config: Config) -> Self {
        let gate = SchemaGate::new(db.clone());
        Self {
            db,
            gate,
            config: Arc::new(config),
        }
    }

    /// 等待 Schema Gate 就绪
    pub async fn ready(&self) -> ApiResult<()> {
        Ok(self.gate.ensure_schema().await?)
    }

    /// 在阻塞线程池中持锁执行数据库操作
    pub async fn run<T, F>(&self, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DaoError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| ApiError::Internal("数据库连接锁已损坏".to_string()))?;
            f(&conn).map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    }
}
