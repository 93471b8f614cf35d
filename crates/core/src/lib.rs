//! 核心类型和工具模块
//!
//! 包含 config, errors, database（Schema Gate + DAO）, pricing, game 等基础功能

pub mod config;
pub mod database;
pub mod errors;
pub mod game;
pub mod pricing;

pub use config::Config;
pub use database::dao::user::Role;
pub use database::gate::{GateError, GateStatus, SchemaGate};
pub use database::DbConnection;
pub use errors::{ConfigError, DaoError, SchemaError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
