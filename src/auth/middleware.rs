//! JWT 认证中间件
//!
//! Only decides whether a request carries a valid identity. It never rejects:
//! requests without one continue unauthenticated and the authorization policy
//! makes the accept/deny call.

use crate::{auth::jwt::JwtService, error::AppError, models::user::Role};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub role: Role,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// 认证中间件：令牌有效则附加 AuthContext，否则保持未认证
pub async fn authentication_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Response {
    let context = match extract_token(req.headers()) {
        Some(token) => match jwt_service.validate(token, Utc::now()) {
            Ok(context) => Some(context),
            Err(rejection) => {
                tracing::debug!(reason = %rejection, "Bearer token rejected");
                None
            }
        },
        None => None,
    };

    if let Some(context) = context {
        tracing::debug!(username = %context.username, role = %context.role, "Request authenticated");
        req.extensions_mut().insert(context);
    }

    next.run(req).await
}

/// 从扩展中提取 AuthContext 的辅助函数
pub fn get_auth_context(req: &Request) -> Option<&AuthContext> {
    req.extensions().get::<AuthContext>()
}
