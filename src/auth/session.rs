//! Request-scoped session: one bearer token paired with one stored refresh
//! token.
//!
//! [`Session::validate`] consumes the session and yields a [`SessionOutcome`]:
//!
//! - `Valid` when the bearer token verifies; nothing is written.
//! - `Renewed` when the bearer token fails but the refresh token has not
//!   expired. A new bearer token and a new refresh value are issued, the
//!   old refresh record is deleted and the new one inserted. The refresh
//!   expiry is carried forward, so rotation never extends the absolute
//!   session lifetime.
//! - `Dead` when the refresh token has expired as well. The stale record is
//!   deleted.
//!
//! Because `validate` takes `self` by value, a caller cannot keep using the
//! pre-rotation session after a renewal.

use crate::{
    auth::jwt::{TokenError, TokenFactory},
    error::AppError,
    models::auth::RefreshToken,
    repository::SessionStore,
    telemetry::redact,
};
use std::{fmt, sync::Arc};
use uuid::Uuid;

pub struct Session {
    access: String,
    refresh: RefreshToken,
    store: Arc<dyn SessionStore>,
    tokens: Arc<TokenFactory>,
}

/// Result of validating a session
#[derive(Debug)]
pub enum SessionOutcome {
    /// The presented pair is live and unchanged
    Valid(Session),
    /// The presented pair was rotated. Both new values must reach the client.
    Renewed(Session),
    /// Not authenticated; the client has to log in again
    Dead,
}

impl SessionOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, SessionOutcome::Dead)
    }

    pub fn is_renewed(&self) -> bool {
        matches!(self, SessionOutcome::Renewed(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionOutcome::Valid(session) | SessionOutcome::Renewed(session) => Some(session),
            SessionOutcome::Dead => None,
        }
    }

    pub fn into_session(self) -> Option<Session> {
        match self {
            SessionOutcome::Valid(session) | SessionOutcome::Renewed(session) => Some(session),
            SessionOutcome::Dead => None,
        }
    }
}

impl Session {
    /// Issue a fresh token pair for `user_id`. Nothing is persisted until
    /// [`register_token_pair`](Self::register_token_pair).
    pub fn new(
        store: Arc<dyn SessionStore>,
        tokens: Arc<TokenFactory>,
        user_id: Uuid,
    ) -> Result<Self, AppError> {
        let access = tokens.issue_access(user_id)?;
        let refresh = tokens.issue_refresh(user_id);

        Ok(Self {
            access,
            refresh,
            store,
            tokens,
        })
    }

    /// Rebuild an unverified session from the two raw client values.
    /// Returns `None` when the refresh value is unknown to the store.
    pub async fn find(
        store: Arc<dyn SessionStore>,
        tokens: Arc<TokenFactory>,
        access: &str,
        refresh: &str,
    ) -> Result<Option<Self>, AppError> {
        let Some(record) = store.find_refresh_token_by_value(refresh).await? else {
            tracing::debug!(refresh = %redact(refresh), "Refresh token not found");
            return Ok(None);
        };

        Ok(Some(Self {
            access: access.to_string(),
            refresh: record,
            store,
            tokens,
        }))
    }

    pub fn access_token(&self) -> &str {
        &self.access
    }

    pub fn refresh_token(&self) -> &RefreshToken {
        &self.refresh
    }

    /// Owner of the session
    pub fn user_id(&self) -> Uuid {
        self.refresh.user_id
    }

    /// Verify the bearer token and renew or expire the session as needed
    pub async fn validate(self) -> Result<SessionOutcome, AppError> {
        let failure = match self.verify_bearer() {
            Ok(()) => {
                metrics::counter!("auth.session.valid").increment(1);
                return Ok(SessionOutcome::Valid(self));
            }
            Err(reason) => reason,
        };

        let now = self.tokens.now();

        if self.refresh.is_expired_at(now) {
            tracing::debug!(
                user_id = %self.user_id(),
                reason = %failure,
                "Session expired"
            );

            // Best-effort cleanup; the session is dead either way.
            if let Err(e) = self.store.delete_refresh_token(&self.refresh.token).await {
                tracing::warn!(
                    user_id = %self.user_id(),
                    error = %e,
                    "Failed to delete expired refresh token"
                );
            }

            metrics::counter!("auth.session.dead").increment(1);
            return Ok(SessionOutcome::Dead);
        }

        let renewed = self.rotated()?;
        self.change_refresh_token(&renewed.refresh).await?;

        tracing::debug!(
            user_id = %self.user_id(),
            reason = %failure,
            expires_at = %renewed.refresh.expires_at,
            "Session renewed"
        );
        metrics::counter!("auth.session.renewed").increment(1);

        Ok(SessionOutcome::Renewed(renewed))
    }

    /// Persist the refresh half of a freshly issued pair
    pub async fn register_token_pair(&self) -> Result<Uuid, AppError> {
        self.store.insert_refresh_token(&self.refresh).await
    }

    /// Replace the current refresh record with `new`
    pub async fn change_refresh_token(&self, new: &RefreshToken) -> Result<(), AppError> {
        let removed = self.store.delete_refresh_token(&self.refresh.token).await?;
        if !removed {
            // A concurrent request rotated this token first.
            tracing::debug!(user_id = %self.user_id(), "Refresh token already removed");
        }

        self.store.insert_refresh_token(new).await?;
        Ok(())
    }

    /// Delete the refresh record matching `token`. Deleting an absent token
    /// succeeds.
    pub async fn logout_refresh_token(&self, token: &str) -> Result<(), AppError> {
        self.store.delete_refresh_token(token).await?;
        Ok(())
    }

    /// Delete every expired refresh token of the session owner. Returns the
    /// number of records removed.
    pub async fn delete_expired_refresh_tokens(&self) -> Result<usize, AppError> {
        let expired = self
            .store
            .list_expired_refresh_tokens(self.user_id(), self.tokens.now())
            .await?;

        let mut removed = 0;
        for token in &expired {
            if self.store.delete_refresh_token(&token.token).await? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn verify_bearer(&self) -> Result<(), TokenError> {
        let claims = self.tokens.verify_access(&self.access)?;

        if claims.user_id()? != self.refresh.user_id {
            return Err(TokenError::SubjectMismatch);
        }

        Ok(())
    }

    /// New pair for the same user with the same absolute expiry
    fn rotated(&self) -> Result<Session, AppError> {
        let user_id = self.user_id();
        let access = self.tokens.issue_access(user_id)?;
        let refresh = self
            .tokens
            .issue_refresh_until(user_id, self.refresh.expires_at);

        Ok(Session {
            access,
            refresh,
            store: self.store.clone(),
            tokens: self.tokens.clone(),
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access", &redact(&self.access))
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}
