//! Authentication-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Persisted refresh token. Never updated in place: rotation deletes the
/// old record and inserts a new one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    /// The opaque refresh secret handed to the client
    pub token: String,
    pub user_id: Uuid,
    /// Absolute expiry, carried forward unchanged across rotations
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// The expiry instant itself counts as expired, matching the
    /// `expires_at <= now` filter used when purging expired tokens.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("id", &self.id)
            .field("token", &crate::telemetry::redact(&self.token))
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response. The credentials themselves travel as cookies.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub expires_in: u64,
    pub session_expires_at: DateTime<Utc>,
}
