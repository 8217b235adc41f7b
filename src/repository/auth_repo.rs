//! Refresh token repository (认证数据访问)

use super::SessionStore;
use crate::{error::AppError, models::auth::RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct AuthRepository {
    db: PgPool,
}

impl AuthRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for AuthRepository {
    /// 存储刷新令牌
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO refresh_tokens (id, token, user_id, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(token.id)
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(id)
    }

    /// 根据令牌值查找刷新令牌
    async fn find_refresh_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, token, user_id, expires_at FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        Ok(token)
    }

    /// 删除刷新令牌
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 查找用户已过期的刷新令牌
    async fn list_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, AppError> {
        let tokens = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, token, user_id, expires_at
            FROM refresh_tokens
            WHERE user_id = $1 AND expires_at <= $2
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.db)
        .await?;

        Ok(tokens)
    }
}
