//! Token pair factory
//! Short-lived HS512 bearer tokens plus long-lived opaque refresh tokens

use crate::{auth::clock::Clock, config::AppConfig, error::AppError, models::auth::RefreshToken};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{distributions::Alphanumeric, Rng};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// MAC algorithm used for every bearer token
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// Claims embedded in a bearer token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

/// Why a bearer token was rejected
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    ClaimExpired,

    #[error("token is malformed")]
    Malformed,

    #[error("token subject does not own the refresh token")]
    SubjectMismatch,
}

/// Issues and verifies the two halves of a session
pub struct TokenFactory {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    refresh_length: usize,
    clock: Arc<dyn Clock>,
}

impl TokenFactory {
    pub fn new(
        secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
        refresh_length: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Expiry is checked against the injected clock, not jsonwebtoken's
        // wall-clock check.
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
            refresh_length,
            clock,
        }
    }

    /// Create token factory from config
    pub fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let secret = config.security.token_secret.expose_secret();

        if secret.len() < 32 {
            return Err(AppError::Config("token secret too short (min 32 chars)".to_string()));
        }

        Ok(Self::new(
            secret.as_bytes(),
            Duration::seconds(config.security.access_token_exp_secs as i64),
            Duration::seconds(config.security.refresh_token_exp_secs as i64),
            config.security.refresh_token_length,
            clock,
        ))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a bearer token for `user_id` valid for the access TTL
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = self.now();
        let expiration = now + self.access_ttl;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Build an unpersisted refresh token for `user_id` expiring after the
    /// refresh TTL. Storing it is up to the caller.
    pub fn issue_refresh(&self, user_id: Uuid) -> RefreshToken {
        self.issue_refresh_until(user_id, self.now() + self.refresh_ttl)
    }

    /// Same as [`issue_refresh`](Self::issue_refresh) with a fixed expiry
    pub fn issue_refresh_until(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> RefreshToken {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.refresh_length)
            .map(char::from)
            .collect();

        RefreshToken {
            id: Uuid::new_v4(),
            token,
            user_id,
            expires_at,
        }
    }

    /// Check signature and expiry of a bearer token
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                        TokenError::SignatureInvalid
                    }
                    ErrorKind::ExpiredSignature => TokenError::ClaimExpired,
                    _ => TokenError::Malformed,
                }
            })?
            .claims;

        if claims.exp <= self.now().timestamp() {
            return Err(TokenError::ClaimExpired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::ManualClock;

    const SECRET: &[u8] = b"unit-test-token-secret-0123456789abcdef";

    fn factory(clock: Arc<ManualClock>) -> TokenFactory {
        TokenFactory::new(
            SECRET,
            Duration::minutes(15),
            Duration::minutes(60),
            128,
            clock,
        )
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let clock = Arc::new(ManualClock::default());
        let tokens = factory(clock.clone());
        let user_id = Uuid::new_v4();

        let token = tokens.issue_access(user_id).unwrap();
        let claims = tokens.verify_access(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_access_token_expires_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let tokens = factory(clock.clone());

        let token = tokens.issue_access(Uuid::new_v4()).unwrap();

        clock.advance(Duration::minutes(14));
        assert!(tokens.verify_access(&token).is_ok());

        clock.advance(Duration::minutes(2));
        assert_eq!(tokens.verify_access(&token), Err(TokenError::ClaimExpired));
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let clock = Arc::new(ManualClock::default());
        let tokens = factory(clock.clone());
        let other = TokenFactory::new(
            b"another-secret-that-is-long-enough-000",
            Duration::minutes(15),
            Duration::minutes(60),
            128,
            clock,
        );

        let token = other.issue_access(Uuid::new_v4()).unwrap();
        assert_eq!(tokens.verify_access(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let tokens = factory(Arc::new(ManualClock::default()));
        assert_eq!(tokens.verify_access("invalid_token"), Err(TokenError::Malformed));
        assert_eq!(tokens.verify_access(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_refresh_token_shape() {
        let clock = Arc::new(ManualClock::default());
        let tokens = factory(clock.clone());
        let user_id = Uuid::new_v4();

        let refresh = tokens.issue_refresh(user_id);

        assert_eq!(refresh.token.len(), 128);
        assert!(refresh.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(refresh.user_id, user_id);
        assert_eq!(refresh.expires_at, clock.now() + Duration::minutes(60));
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let tokens = factory(Arc::new(ManualClock::default()));
        let user_id = Uuid::new_v4();

        let a = tokens.issue_refresh(user_id);
        let b = tokens.issue_refresh(user_id);

        assert_ne!(a.token, b.token);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_access_tokens_are_unique() {
        let tokens = factory(Arc::new(ManualClock::default()));
        let user_id = Uuid::new_v4();

        assert_ne!(
            tokens.issue_access(user_id).unwrap(),
            tokens.issue_access(user_id).unwrap()
        );
    }
}
