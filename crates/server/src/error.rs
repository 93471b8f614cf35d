//! API 错误类型
//!
//! 所有错误都以 `{"error": "<消息>"}` 返回。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sweetpos_core::{DaoError, GateError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// 缺少必填字段或违反业务规则
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    /// 角色权限不足
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// 请求体不是合法 JSON
    #[error("JSON 解析失败: {0}")]
    Json(String),

    #[error(transparent)]
    Schema(#[from] GateError),

    #[error("{0}")]
    Database(String),

    /// 框架层拒绝（请求体过大等）
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Json(_)
            | ApiError::Schema(_)
            | ApiError::Database(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        match err {
            DaoError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DaoError::Invalid(message) => ApiError::BadRequest(message),
            DaoError::DatabaseError(_) => ApiError::Database(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[Api] {}", self);
        } else {
            tracing::debug!("[Api] {} {}", status.as_u16(), self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
