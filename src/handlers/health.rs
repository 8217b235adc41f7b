//! 健康检查处理器

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::{db, middleware::AppState};

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub storage: StorageCheck,
}

/// 存储检查项
#[derive(Serialize)]
pub struct StorageCheck {
    pub backend: &'static str,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_sessions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

static APP_START: OnceLock<Instant> = OnceLock::new();

/// 设置应用启动时间
pub fn set_start_time() {
    APP_START.get_or_init(Instant::now);
}

/// 获取应用运行时间（秒）
pub fn get_uptime() -> u64 {
    APP_START.get().map_or(0, |start| start.elapsed().as_secs())
}

/// 健康检查
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let storage = match &state.db {
        None => StorageCheck {
            backend: "memory",
            status: "healthy".to_string(),
            live_sessions: None,
            message: None,
        },
        Some(pool) => {
            let now = state.auth_service.tokens().now();
            match db::session_store_report(pool, now).await {
                Ok(report) => StorageCheck {
                    backend: "postgres",
                    status: "healthy".to_string(),
                    live_sessions: Some(report.live_sessions),
                    message: None,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Session store check failed");
                    StorageCheck {
                        backend: "postgres",
                        status: "unhealthy".to_string(),
                        live_sessions: None,
                        message: Some(e.user_message()),
                    }
                }
            }
        }
    };

    let status = if storage.status == "healthy" { "ok" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: get_uptime(),
        storage,
    })
}
