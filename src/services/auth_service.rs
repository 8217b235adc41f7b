//! 认证服务：登录、会话校验、登出

use crate::{
    auth::{
        jwt::TokenFactory,
        password::CredentialHasher,
        session::{Session, SessionOutcome},
    },
    error::AppError,
    models::user::User,
    repository::{SessionStore, UserQueries},
    telemetry::redact,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct AuthService {
    users: Arc<dyn UserQueries>,
    sessions: Arc<dyn SessionStore>,
    tokens: Arc<TokenFactory>,
    hasher: Arc<CredentialHasher>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserQueries>,
        sessions: Arc<dyn SessionStore>,
        tokens: Arc<TokenFactory>,
        hasher: Arc<CredentialHasher>,
    ) -> Self {
        Self {
            users,
            sessions,
            tokens,
            hasher,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenFactory> {
        &self.tokens
    }

    /// 用户登录
    ///
    /// Fails with `InvalidCredentials` for an unknown username and for a
    /// wrong password alike. A `Persistence` error means the session was not
    /// stored and the user must not be treated as logged in.
    pub async fn create_session(&self, username: &str, password: &str) -> Result<Session, AppError> {
        let user = match self.resolve_by_credentials(username, password).await? {
            Some(user) => user,
            None => {
                metrics::counter!("auth.login.failure").increment(1);
                tracing::info!(%username, "Login rejected");
                return Err(AppError::InvalidCredentials);
            }
        };

        let session = Session::new(self.sessions.clone(), self.tokens.clone(), user.id)?;

        // 清理过期令牌失败不影响登录
        match session.delete_expired_refresh_tokens().await {
            Ok(0) => {}
            Ok(removed) => {
                tracing::debug!(user_id = %user.id, removed, "Purged expired refresh tokens")
            }
            Err(e) => tracing::warn!(
                user_id = %user.id,
                error = %e,
                "Failed to purge expired refresh tokens"
            ),
        }

        session.register_token_pair().await?;

        metrics::counter!("auth.login.success").increment(1);
        tracing::info!(user_id = %user.id, %username, "Session created");

        Ok(session)
    }

    /// 校验会话
    ///
    /// `Ok(SessionOutcome::Dead)` means "not authenticated"; an `Err` is a
    /// storage failure and says nothing about the credentials.
    pub async fn check_session(
        &self,
        access: &str,
        refresh: &str,
    ) -> Result<SessionOutcome, AppError> {
        let session =
            match Session::find(self.sessions.clone(), self.tokens.clone(), access, refresh).await? {
                Some(session) => session,
                None => {
                    metrics::counter!("auth.session.dead").increment(1);
                    return Ok(SessionOutcome::Dead);
                }
            };

        session.validate().await
    }

    /// 登出（删除刷新令牌）
    ///
    /// Never fails: a missing record or a storage error is logged and the
    /// caller proceeds to clear the client's credentials.
    pub async fn logout(&self, access: &str, refresh: &str) {
        let user_id = self
            .tokens
            .verify_access(access)
            .ok()
            .and_then(|claims| claims.user_id().ok());

        match self.sessions.delete_refresh_token(refresh).await {
            Ok(true) => tracing::info!(user_id = ?user_id, "Logged out"),
            Ok(false) => tracing::debug!(
                user_id = ?user_id,
                refresh = %redact(refresh),
                "Logout for unknown refresh token"
            ),
            Err(e) => tracing::warn!(
                user_id = ?user_id,
                refresh = %redact(refresh),
                error = %e,
                "Failed to delete refresh token on logout"
            ),
        }
    }

    /// Look up a user by username and password digest in one query
    pub async fn resolve_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        let digest = self.hasher.hash(password);
        self.users.find_by_credentials(username, &digest).await
    }

    pub async fn resolve_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        self.users.find_by_id(user_id).await
    }

    pub async fn resolve_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.users.find_by_username(username).await
    }
}
