//! 角色鉴权
//!
//! 调用方角色来自 `X-Actor-Role` 请求头，缺失视为匿名。
//! 权限从高到低：superadmin > admin > seller > 匿名。

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sweetpos_core::Role;

pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// 发起请求的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: Option<Role>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self { role: None }
    }

    /// 要求至少具备 `min` 角色
    pub fn require(&self, min: Role) -> Result<(), ApiError> {
        match self.role {
            Some(role) if role >= min => Ok(()),
            _ => Err(ApiError::Forbidden(format!("需要 {min} 及以上权限"))),
        }
    }

    /// 写入变更日志时使用的角色名
    pub fn name(&self) -> &'static str {
        self.role.map(|r| r.as_str()).unwrap_or("anonymous")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_ROLE_HEADER) else {
            return Ok(Actor::anonymous());
        };
        let raw = value
            .to_str()
            .map_err(|_| ApiError::bad_request("X-Actor-Role 不是合法文本"))?;
        if raw.trim().is_empty() {
            return Ok(Actor::anonymous());
        }
        let role = Role::try_from(raw).map_err(ApiError::BadRequest)?;
        Ok(Actor { role: Some(role) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(header: Option<&str>) -> Result<Actor, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header("X-Actor-Role", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn header_is_parsed_case_insensitively() {
        assert_eq!(extract(Some("Admin")).await.unwrap().role, Some(Role::Admin));
        assert_eq!(extract(None).await.unwrap(), Actor::anonymous());
        assert_eq!(
            extract(Some("root")).await.unwrap_err().status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn require_respects_role_order() {
        let admin = Actor {
            role: Some(Role::Admin),
        };
        assert!(admin.require(Role::Seller).is_ok());
        assert!(admin.require(Role::Admin).is_ok());
        assert_eq!(
            admin.require(Role::Superadmin).unwrap_err().status_code(),
            StatusCode::FORBIDDEN
        );
        assert!(Actor::anonymous().require(Role::Seller).is_err());
        assert_eq!(Actor::anonymous().name(), "anonymous");
    }
}
