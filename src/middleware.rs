//! HTTP 中间件
//! 应用状态、请求追踪、跨域策略

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{AuthorizationPolicy, JwtService, PasswordHasher},
    config::{AppConfig, CorsConfig},
    error::AppError,
    repository::{CredentialStore, ProductStore},
    services::AuthService,
};

/// 应用状态
///
/// 启动时一次性构建，之后只读；Clone 只复制 Arc 指针。
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub auth_service: Arc<AuthService>,
    pub jwt_service: Arc<JwtService>,
    pub policy: Arc<AuthorizationPolicy>,
    pub credential_store: Arc<dyn CredentialStore>,
    pub product_store: Arc<dyn ProductStore>,
}

impl AppState {
    /// 显式装配所有组件
    pub fn new(
        config: AppConfig,
        credential_store: Arc<dyn CredentialStore>,
        product_store: Arc<dyn ProductStore>,
    ) -> Result<Self, AppError> {
        let hasher = Arc::new(PasswordHasher::from_config(&config)?);
        let jwt_service = Arc::new(JwtService::from_config(&config)?);
        let policy = Arc::new(AuthorizationPolicy::catalog()?);

        let auth_service = Arc::new(AuthService::new(
            credential_store.clone(),
            hasher,
            jwt_service.clone(),
            Arc::new(config.clone()),
        ));

        Ok(Self {
            config,
            auth_service,
            jwt_service,
            policy,
            credential_store,
            product_store,
        })
    }
}

tokio::task_local! {
    static CURRENT_REQUEST_ID: String;
}

/// 当前请求的 request_id，仅在请求追踪中间件内部可用
pub fn current_request_id() -> Option<String> {
    CURRENT_REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    // 生成或提取 trace_id/request_id
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        // 错误响应体中的 request_id 与响应头保持一致
        let mut response = CURRENT_REQUEST_ID
            .scope(request_id.clone(), next.run(req))
            .await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        metrics::counter!(
            "http_requests_total",
            "method" => method_label(&method),
            "status" => status_label(status)
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            path = %path,
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中回写 trace_id / request_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// 指标标签使用静态字符串，避免基数失控
fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

fn status_label(status: u16) -> &'static str {
    match status {
        200 => "200",
        201 => "201",
        204 => "204",
        400 => "400",
        401 => "401",
        403 => "403",
        404 => "404",
        409 => "409",
        500 => "500",
        _ => "other",
    }
}

/// 跨域策略：只允许配置中的来源，允许携带凭证，接受任意请求头
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        // 通配请求头不能与 credentials 同时使用，改为回显预检请求的头
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[tokio::test]
    async fn test_current_request_id_scoped() {
        assert!(current_request_id().is_none());

        let seen = CURRENT_REQUEST_ID
            .scope("req-1".to_string(), async { current_request_id() })
            .await;
        assert_eq!(seen.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_metric_labels_are_bounded() {
        assert_eq!(method_label(&Method::PATCH), "OTHER");
        assert_eq!(status_label(418), "other");
        assert_eq!(status_label(403), "403");
    }
}
