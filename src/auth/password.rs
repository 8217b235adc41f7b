//! Credential digests: SHA-512 over the password combined with a
//! process-wide salt. Deterministic, so login resolves users with a single
//! `(username, digest)` lookup instead of fetching and comparing.

use crate::{config::AppConfig, error::AppError};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha512};

/// Password hasher bound to the configured salt
pub struct CredentialHasher {
    salt: Secret<String>,
}

impl CredentialHasher {
    pub fn new(salt: Secret<String>) -> Self {
        Self { salt }
    }

    /// Create hasher from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let salt = config.security.password_salt.expose_secret();

        if salt.len() < 16 {
            return Err(AppError::Config("password salt too short (min 16 chars)".to_string()));
        }

        Ok(Self::new(Secret::new(salt.clone())))
    }

    /// Hex-encoded digest of `password`
    pub fn hash(&self, password: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(password.as_bytes());
        hasher.update(self.salt.expose_secret().as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher(salt: &str) -> CredentialHasher {
        CredentialHasher::new(Secret::new(salt.to_string()))
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hasher = hasher("unit-test-salt-0123456789");

        assert_eq!(hasher.hash("p1"), hasher.hash("p1"));
        assert_eq!(hasher.hash("p1").len(), 128);
    }

    #[test]
    fn test_hash_depends_on_password() {
        let hasher = hasher("unit-test-salt-0123456789");
        assert_ne!(hasher.hash("p1"), hasher.hash("p2"));
    }

    #[test]
    fn test_hash_depends_on_salt() {
        let a = hasher("unit-test-salt-aaaaaaaaaa");
        let b = hasher("unit-test-salt-bbbbbbbbbb");
        assert_ne!(a.hash("p1"), b.hash("p1"));
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let hasher = hasher("unit-test-salt-0123456789");
        let digest = hasher.hash("hunter2hunter2");
        assert!(!digest.contains("hunter2"));
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
