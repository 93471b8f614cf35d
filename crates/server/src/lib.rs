//! HTTP 服务 crate
//!
//! 每个资源一个 handler 模块。所有 handler 先经过 Schema Gate，
//! 再按角色鉴权、校验输入、调用 DAO，最后返回 JSON。

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
