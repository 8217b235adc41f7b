//! 用户注册

use crate::{
    auth::{clock::Clock, password::CredentialHasher},
    error::AppError,
    models::user::{RegisterRequest, User},
    repository::UserQueries,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct RegisterService {
    users: Arc<dyn UserQueries>,
    hasher: Arc<CredentialHasher>,
    clock: Arc<dyn Clock>,
}

impl RegisterService {
    pub fn new(
        users: Arc<dyn UserQueries>,
        hasher: Arc<CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    /// Create a user and return its id. Username and email must both be
    /// unused.
    pub async fn register(&self, req: &RegisterRequest) -> Result<Uuid, AppError> {
        req.validate()?;

        if self.users.find_by_username(&req.username).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "User with username {} already exists",
                req.username
            )));
        }

        if self.users.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "User with email {} already exists",
                req.email
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: req.username.clone(),
            password_digest: self.hasher.hash(&req.password),
            email: req.email.clone(),
            last_seen: self.clock.now(),
        };

        // The store's unique constraints still decide races between the
        // checks above and this insert.
        let user_id = self.users.create_user(&user).await?;

        tracing::info!(%user_id, username = %user.username, "User registered");
        Ok(user_id)
    }
}
