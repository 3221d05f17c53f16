//! 认证相关 HTTP 处理器

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::AppState,
    models::auth::{LoginRequest, WhoAmIResponse},
    services::LoginError,
};

/// 登录：成功时响应体即为令牌字符串
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<String, AppError> {
    match state.auth_service.login(&req.username, &req.password).await {
        Ok(token) => Ok(token),
        Err(LoginError::NotFound) if state.auth_service.uniform_login_failure() => {
            Err(AppError::Unauthorized)
        }
        Err(e) => Err(e.into()),
    }
}

/// 当前登录身份
pub async fn me(auth_context: AuthContext) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        username: auth_context.username,
        role: auth_context.role,
    })
}
