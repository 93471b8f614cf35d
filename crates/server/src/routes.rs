//! 路由定义

use crate::error::ApiError;
use crate::extract::{method_not_allowed, preflight};
use crate::handlers::{
    accounting, days, deliveries, desserts, game, health, inventory, notifications, recipes,
    sales, sellers, users,
};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// 每个资源路由都响应 OPTIONS，不支持的方法返回 405
fn resource(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.options(preflight).fallback(method_not_allowed)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("接口不存在".to_string())
}

/// 中间件层（超时、请求体过大）产生的错误响应没有 JSON 体，这里统一改写
async fn json_error_body(response: Response) -> Response {
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    if is_json {
        return response;
    }
    ApiError::Rejected {
        status,
        message: status.canonical_reason().unwrap_or("请求被拒绝").to_string(),
    }
    .into_response()
}

pub fn create_router(state: AppState) -> Router {
    let server = state.config.server.clone();

    Router::new()
        .route("/api/health", resource(get(health::health)))
        // 甜品
        .route("/api/desserts", resource(get(desserts::list).post(desserts::create)))
        .route(
            "/api/desserts/:id",
            resource(put(desserts::update).delete(desserts::remove)),
        )
        // 卖家
        .route("/api/sellers", resource(get(sellers::list).post(sellers::create)))
        .route(
            "/api/sellers/:id",
            resource(put(sellers::update).delete(sellers::remove)),
        )
        // 日账
        .route("/api/days", resource(get(days::list).post(days::create)))
        .route(
            "/api/days/:id",
            resource(patch(days::set_closed).delete(days::remove)),
        )
        // 销售
        .route("/api/sales", resource(get(sales::list).post(sales::create)))
        .route(
            "/api/sales/:id",
            resource(put(sales::update).delete(sales::remove)),
        )
        .route("/api/sales/:id/logs", resource(get(sales::logs)))
        // 配方
        .route("/api/recipes", resource(get(recipes::list).post(recipes::create)))
        .route(
            "/api/recipes/ingredients",
            resource(post(recipes::create_ingredient)),
        )
        .route(
            "/api/recipes/ingredients/:id",
            resource(put(recipes::update_ingredient)),
        )
        .route("/api/recipes/:id/cost", resource(get(recipes::unit_cost)))
        .route("/api/recipes/production", resource(post(recipes::production)))
        // 库存
        .route("/api/inventory", resource(get(inventory::list).post(inventory::create)))
        .route(
            "/api/inventory/movements",
            resource(get(inventory::list_movements).post(inventory::record_movement)),
        )
        .route("/api/inventory/:id", resource(put(inventory::update)))
        // 配送
        .route(
            "/api/deliveries",
            resource(get(deliveries::list).post(deliveries::create)),
        )
        .route("/api/deliveries/:id", resource(delete(deliveries::remove)))
        // 记账
        .route(
            "/api/accounting",
            resource(get(accounting::list).post(accounting::create)),
        )
        .route("/api/accounting/:id", resource(delete(accounting::remove)))
        // 通知
        .route(
            "/api/notifications",
            resource(get(notifications::list).post(notifications::create)),
        )
        .route(
            "/api/notifications/:id",
            resource(patch(notifications::mark_read)),
        )
        // 账号
        .route("/api/users", resource(get(users::list).post(users::create)))
        .route("/api/users/login", resource(post(users::login)))
        .route("/api/users/:id", resource(put(users::update)))
        // 转盘
        .route("/api/game", resource(get(game::overview).post(game::play)))
        .fallback(not_found)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(middleware::map_response(json_error_body))
        // 预检由各路由的 OPTIONS 处理，这里只补跨域响应头
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("content-type, x-actor-role"),
        ))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{self, StatusCode};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn empty_timeout_response_gets_json_body() {
        let response = http::Response::builder()
            .status(StatusCode::REQUEST_TIMEOUT)
            .body(Body::empty())
            .unwrap();

        let response = json_error_body(response).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body_json(response).await["error"], "Request Timeout");
    }

    #[tokio::test]
    async fn json_and_success_responses_pass_through() {
        let ok = http::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from("plain"))
            .unwrap();
        let ok = json_error_body(ok).await;
        let bytes = to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"plain");

        let not_found = ApiError::NotFound("甜品 9 不存在".to_string()).into_response();
        let not_found = json_error_body(not_found).await;
        assert_eq!(body_json(not_found).await["error"], "甜品 9 不存在");
    }
}
