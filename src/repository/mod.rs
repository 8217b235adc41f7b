//! Storage contracts consumed by the session core, with a PostgreSQL and an
//! in-memory implementation.

pub mod auth_repo;
pub mod memory;
pub mod user_repo;

pub use auth_repo::AuthRepository;
pub use memory::MemoryStore;
pub use user_repo::UserRepository;

use crate::{
    error::AppError,
    models::{auth::RefreshToken, user::User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Refresh token persistence. Each call is a single atomic storage
/// operation; no multi-statement transactions are assumed.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new refresh token and return its storage id
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<Uuid, AppError>;

    async fn find_refresh_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AppError>;

    /// Delete by value. Returns `false` when nothing matched, which is not an
    /// error: concurrent renewals and repeated logouts race to delete.
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AppError>;

    /// Tokens owned by `user_id` with `expires_at <= now`
    async fn list_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, AppError>;
}

/// User lookups. Read-only from the session core's point of view;
/// `create_user` exists for registration.
#[async_trait]
pub trait UserQueries: Send + Sync {
    /// Insert a user; fails with `Conflict` when username or email is taken
    async fn create_user(&self, user: &User) -> Result<Uuid, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Single lookup matching both username and password digest
    async fn find_by_credentials(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<Option<User>, AppError>;
}
