//! 测试公共模块
//! 提供测试辅助函数和测试工具

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use catalog_service::{
    auth::PasswordHasher,
    config::{AppConfig, CorsConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig},
    middleware::AppState,
    models::user::{Identity, Role},
    repository::{InMemoryCredentialStore, InMemoryProductStore},
    routes,
};
use chrono::Utc;
use http_body_util::BodyExt;
use secrecy::Secret;
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const ALICE_PASSWORD: &str = "alice-password";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const ALLOWED_ORIGIN: &str = "http://localhost:4200";

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(), // 使用随机端口
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new(TEST_SECRET.to_string()),
            token_ttl_secs: 300, // 5分钟用于测试
            clock_skew_leeway_secs: 30,
            password_min_length: 8,
            // 测试中使用低开销参数
            argon2_memory_kib: 1024,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            uniform_login_failure: false,
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
        },
        cors: CorsConfig {
            allowed_origins: vec![ALLOWED_ORIGIN.to_string(), "http://localhost:80".to_string()],
        },
    }
}

pub fn test_hasher(config: &AppConfig) -> PasswordHasher {
    PasswordHasher::from_config(config).expect("Failed to create password hasher")
}

/// 预置用户：alice (USER)、admin (ADMIN)、broken (哈希损坏)
pub fn seeded_identities(config: &AppConfig) -> Vec<Identity> {
    let hasher = test_hasher(config);
    vec![
        Identity::new(
            "alice",
            hasher.hash(ALICE_PASSWORD).expect("Failed to hash password"),
            Role::User,
        ),
        Identity::new(
            "admin",
            hasher.hash(ADMIN_PASSWORD).expect("Failed to hash password"),
            Role::Admin,
        ),
        Identity::new("broken", "not-a-phc-string", Role::User),
    ]
}

/// 创建测试应用状态
pub fn create_test_app_state(config: AppConfig) -> Arc<AppState> {
    let credential_store = Arc::new(InMemoryCredentialStore::with_users(seeded_identities(
        &config,
    )));
    let product_store = Arc::new(InMemoryProductStore::new());

    Arc::new(
        AppState::new(config, credential_store, product_store)
            .expect("Failed to create app state"),
    )
}

pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(create_test_config())
}

pub fn create_test_app_with(config: AppConfig) -> (Router, Arc<AppState>) {
    let state = create_test_app_state(config);
    (routes::create_router(state.clone()), state)
}

/// 直接签发令牌，绕过登录
pub fn token_for(state: &AppState, username: &str, role: Role) -> String {
    state
        .jwt_service
        .issue(username, role, Utc::now())
        .expect("Failed to issue token")
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
