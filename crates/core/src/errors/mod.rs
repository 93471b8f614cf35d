//! 错误类型模块
//!
//! ## 模块结构
//! - `store_error`: 存储相关错误（SchemaError, DaoError, ConfigError）

pub mod store_error;

pub use store_error::{ConfigError, DaoError, SchemaError};
