//! 会话认证中间件
//! The credential pair travels as two HttpOnly cookies.

use crate::{
    auth::session::{Session, SessionOutcome},
    error::AppError,
    middleware::AppState,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
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

/// Value of the cookie `name`, if present and non-empty
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}

/// Both credential cookies, or `None` if either is missing
pub fn extract_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let access = read_cookie(headers, ACCESS_TOKEN_COOKIE)?;
    let refresh = read_cookie(headers, REFRESH_TOKEN_COOKIE)?;
    Some((access, refresh))
}

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> Result<HeaderValue, AppError> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::internal_error(&format!("Invalid cookie header: {}", e)))
}

/// `Set-Cookie` values carrying both halves of `session`.
///
/// Both cookies live until the refresh token expires: the bearer token
/// inside must still reach the server after its own expiry so the session
/// can be renewed.
pub fn session_cookies(
    session: &Session,
    secure: bool,
    now: DateTime<Utc>,
) -> Result<[HeaderValue; 2], AppError> {
    let max_age = (session.refresh_token().expires_at - now).num_seconds().max(0);

    Ok([
        cookie(ACCESS_TOKEN_COOKIE, session.access_token(), max_age, secure)?,
        cookie(
            REFRESH_TOKEN_COOKIE,
            &session.refresh_token().token,
            max_age,
            secure,
        )?,
    ])
}

/// `Set-Cookie` values expiring both credential cookies
pub fn clear_cookies(secure: bool) -> Result<[HeaderValue; 2], AppError> {
    Ok([
        cookie(ACCESS_TOKEN_COOKIE, "", 0, secure)?,
        cookie(REFRESH_TOKEN_COOKIE, "", 0, secure)?,
    ])
}

/// Append `cookies` as `Set-Cookie` headers
pub fn append_cookies(headers: &mut HeaderMap, cookies: [HeaderValue; 2]) {
    for value in cookies {
        headers.append(SET_COOKIE, value);
    }
}

/// 会话认证中间件 - 必须认证
///
/// Runs the session check for the cookie pair. A renewed pair is written back
/// on the response; a dead session answers 401 and clears the cookies.
pub async fn session_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secure = state.config.security.cookie_secure;

    let Some((access, refresh)) = extract_credentials(req.headers()) else {
        return Err(AppError::Unauthorized);
    };

    let outcome = state.auth_service.check_session(&access, &refresh).await?;

    let (session, renewed) = match outcome {
        SessionOutcome::Valid(session) => (session, false),
        SessionOutcome::Renewed(session) => (session, true),
        SessionOutcome::Dead => {
            let mut response = AppError::Unauthorized.into_response();
            append_cookies(response.headers_mut(), clear_cookies(secure)?);
            return Ok(response);
        }
    };

    req.extensions_mut().insert(AuthContext {
        user_id: session.user_id(),
    });

    let mut response = next.run(req).await;

    if renewed {
        let now = state.auth_service.tokens().now();
        append_cookies(response.headers_mut(), session_cookies(&session, secure, now)?);
    }

    Ok(response)
}
