//! HTTP 中间件
//! 应用状态与请求追踪

use crate::{
    auth::{clock::Clock, jwt::TokenFactory, password::CredentialHasher},
    config::AppConfig,
    error::AppError,
    repository::{SessionStore, UserQueries},
    services::{AuthService, RegisterService},
};
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// `None` when running on the in-memory store
    pub db: Option<sqlx::PgPool>,
    pub auth_service: Arc<AuthService>,
    pub register_service: Arc<RegisterService>,
}

impl AppState {
    /// Wire the services over the given stores. Secrets come from `config`.
    pub fn new(
        config: AppConfig,
        db: Option<sqlx::PgPool>,
        users: Arc<dyn UserQueries>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let tokens = Arc::new(TokenFactory::from_config(&config, clock.clone())?);
        let hasher = Arc::new(CredentialHasher::from_config(&config)?);

        let auth_service = Arc::new(AuthService::new(
            users.clone(),
            sessions,
            tokens,
            hasher.clone(),
        ));
        let register_service = Arc::new(RegisterService::new(users, hasher, clock));

        Ok(Self {
            config,
            db,
            auth_service,
            register_service,
        })
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 使用静态标签，避免指标基数膨胀
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            404 => "404",
            409 => "409",
            500 => "500",
            503 => "503",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        // 在响应头中添加 trace_id
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
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
