//! 用户相关 HTTP 处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        auth::{RegisterRequest, UpdatePasswordRequest},
        user::{Role, UserResponse},
    },
};

/// 自助注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.auth_service.register(&req.username, &req.password).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(identity))))
}

/// 普通用户只能操作自己的账户，管理员不受限
fn ensure_self_or_admin(auth_context: &AuthContext, username: &str) -> Result<(), AppError> {
    if auth_context.role == Role::Admin || auth_context.username == username {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    ensure_self_or_admin(&auth_context, &username)?;

    let identity = state
        .credential_store
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(identity.into()))
}

/// 修改密码：本人需提供当前密码，管理员可直接重置他人密码
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(username): Path<String>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Json<UserResponse>, AppError> {
    ensure_self_or_admin(&auth_context, &username)?;

    let current_password = if auth_context.username == username {
        let current = req
            .current_password
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("current_password is required".to_string()))?;
        Some(current)
    } else {
        None
    };

    let identity = state
        .auth_service
        .change_password(&username, &req.password, current_password)
        .await?;

    Ok(Json(identity.into()))
}

/// 删除用户
///
/// 已签发的令牌不会被吊销，直到过期前仍可通过认证
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure_self_or_admin(&auth_context, &username)?;

    if !state.credential_store.delete(&username).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(target: "audit", username = %username, actor = %auth_context.username, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 列出用户
pub async fn list_users(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let users: Vec<UserResponse> = state
        .credential_store
        .list()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(json!({
        "users": users,
        "count": users.len()
    })))
}
