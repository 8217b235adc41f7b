//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::{
        append_cookies, clear_cookies, read_cookie, session_cookies, AuthContext,
        ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE,
    },
    error::AppError,
    middleware::AppState,
    models::{
        auth::{LoginRequest, LoginResponse},
        user::{RegisterRequest, UserResponse},
    },
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.register_service.register(&req).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": user_id }))))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth_service
        .create_session(&req.username, &req.password)
        .await?;

    let tokens = state.auth_service.tokens();
    let cookies = session_cookies(&session, state.config.security.cookie_secure, tokens.now())?;

    let body = LoginResponse {
        user_id: session.user_id(),
        expires_in: tokens.access_ttl().num_seconds().max(0) as u64,
        session_expires_at: session.refresh_token().expires_at,
    };

    let mut headers = HeaderMap::new();
    append_cookies(&mut headers, cookies);

    Ok((headers, Json(body)))
}

/// 登出
///
/// Always succeeds and always clears the credential cookies.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    // The refresh cookie alone is enough to end the session.
    if let Some(refresh) = read_cookie(&headers, REFRESH_TOKEN_COOKIE) {
        let access = read_cookie(&headers, ACCESS_TOKEN_COOKIE).unwrap_or_default();
        state.auth_service.logout(&access, &refresh).await;
    }

    let mut response_headers = HeaderMap::new();
    append_cookies(
        &mut response_headers,
        clear_cookies(state.config.security.cookie_secure)?,
    );

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth_service
        .resolve_by_id(auth_context.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user"))?;

    Ok(Json(UserResponse::from(user)))
}
