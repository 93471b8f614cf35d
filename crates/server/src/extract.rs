//! 请求提取器
//!
//! 包装 axum 自带的提取器，让所有拒绝都走统一的 JSON 错误格式：
//! - 请求体语法错误：500
//! - 缺少必填字段、字段类型不符：400

use crate::error::ApiError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    response::IntoResponse,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// JSON 请求体
pub struct JsonBody<T>(pub T);

/// 把 serde_json 错误归类为 400 或 500
pub fn classify_json_error(err: serde_json::Error) -> ApiError {
    match err.classify() {
        Category::Data => ApiError::BadRequest(err.to_string()),
        Category::Syntax | Category::Eof | Category::Io => ApiError::Json(err.to_string()),
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::Rejected {
                status: rejection.status(),
                message: rejection.body_text(),
            })?;
        // 空请求体按空对象处理，缺失字段由反序列化报 400
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };
        serde_json::from_slice(body)
            .map(JsonBody)
            .map_err(classify_json_error)
    }
}

/// 查询参数
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::try_from_uri(&parts.uri)
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// 路径中的数字 ID
pub struct IdPath(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<i64>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| IdPath(id))
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// 预检请求
pub async fn preflight() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// 路由存在但方法不支持
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// 必填字段校验
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::BadRequest(format!("缺少必填字段: {field}")))
}

/// 必填且非空的文本字段
pub fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ApiError::BadRequest(format!("缺少必填字段: {field}"))),
    }
}
