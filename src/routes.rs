//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::{auth, handlers, middleware::AppState};

/// 请求体上限（1 MiB）
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
///
/// 中间件执行顺序（由外到内）：CORS → 请求追踪 → 请求体限制 → 认证 → 授权 → handler
pub fn create_router(state: Arc<AppState>) -> Router {
    // 探针
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // 认证与账户
    let account_routes = Router::new()
        .route("/login", post(handlers::auth::login))
        .route("/users/register", post(handlers::user::register))
        .route("/users/me", get(handlers::auth::me))
        .route("/users", get(handlers::user::list_users))
        .route(
            "/users/{username}",
            get(handlers::user::get_user)
                .put(handlers::user::update_user)
                .delete(handlers::user::delete_user),
        );

    // 商品目录
    let catalog_routes = Router::new()
        .route(
            "/products",
            get(handlers::product::list_products).post(handlers::product::create_product),
        )
        .route(
            "/products/{id}",
            get(handlers::product::get_product)
                .put(handlers::product::update_product)
                .delete(handlers::product::delete_product),
        );

    let cors = crate::middleware::cors_layer(&state.config.cors);

    // 授权覆盖全部路由，访问规则集中在 AuthorizationPolicy
    Router::new()
        .merge(health_routes)
        .merge(account_routes)
        .merge(catalog_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.policy.clone(),
            auth::authorization_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.jwt_service.clone(),
            auth::authentication_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(axum::middleware::from_fn(crate::middleware::request_tracking_middleware))
        .layer(cors)
        .with_state(state)
}
