//! In-process implementation of both storage contracts, for running
//! without PostgreSQL and for tests.

use super::{SessionStore, UserQueries};
use crate::{
    error::AppError,
    models::{auth::RefreshToken, user::User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        RwLock,
    },
};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    /// Refresh tokens keyed by token value
    tokens: DashMap<String, RefreshToken>,
    users: RwLock<HashMap<Uuid, User>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert and delete fail with a persistence
    /// error, as a down database would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn refresh_token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn refresh_tokens_for(&self, user_id: Uuid) -> Vec<RefreshToken> {
        self.tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::persistence("memory store is rejecting writes"));
        }
        Ok(())
    }

    fn find_user<F>(&self, predicate: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.values().find(|user| predicate(user)).cloned()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<Uuid, AppError> {
        self.check_writable()?;

        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(
                "refresh token value already exists".to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
                Ok(token.id)
            }
        }
    }

    async fn find_refresh_token_by_value(
        &self,
        token: &str,
    ) -> Result<Option<RefreshToken>, AppError> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, AppError> {
        self.check_writable()?;
        Ok(self.tokens.remove(token).is_some())
    }

    async fn list_expired_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, AppError> {
        Ok(self
            .tokens
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.expires_at <= now)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl UserQueries for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<Uuid, AppError> {
        self.check_writable()?;

        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        let taken = users
            .values()
            .any(|existing| existing.username == user.username || existing.email == user.email);
        if taken || users.contains_key(&user.id) {
            return Err(AppError::Conflict(
                "username or email is already registered".to_string(),
            ));
        }

        users.insert(user.id, user.clone());
        Ok(user.id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|user| user.username == username))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|user| user.email == email))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        Ok(users.get(&id).cloned())
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password_digest: &str,
    ) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|user| {
            user.username == username && user.password_digest == password_digest
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(user_id: Uuid, value: &str, expires_at: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            token: value.to_string(),
            user_id,
            expires_at,
        }
    }

    fn user(username: &str, email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_digest: "digest".to_string(),
            email: email.to_string(),
            last_seen: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_refresh_token_insert_find_delete() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let record = token(user_id, "abc", Utc::now() + Duration::hours(1));

        let id = store.insert_refresh_token(&record).await.unwrap();
        assert_eq!(id, record.id);

        let found = store.find_refresh_token_by_value("abc").await.unwrap();
        assert_eq!(found, Some(record));

        assert!(store.delete_refresh_token("abc").await.unwrap());
        assert!(!store.delete_refresh_token("abc").await.unwrap());
        assert!(store.find_refresh_token_by_value("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_value_rejected() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let expires = Utc::now() + Duration::hours(1);

        store.insert_refresh_token(&token(user_id, "dup", expires)).await.unwrap();
        let second = store.insert_refresh_token(&token(user_id, "dup", expires)).await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_expired_is_scoped_to_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let now = Utc::now();

        store.insert_refresh_token(&token(alice, "a-old", now - Duration::minutes(1))).await.unwrap();
        store.insert_refresh_token(&token(alice, "a-new", now + Duration::minutes(1))).await.unwrap();
        store.insert_refresh_token(&token(bob, "b-old", now - Duration::minutes(1))).await.unwrap();

        let expired = store.list_expired_refresh_tokens(alice, now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].token, "a-old");
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = MemoryStore::new();

        store.create_user(&user("alice", "alice@example.com")).await.unwrap();

        let same_name = store.create_user(&user("alice", "other@example.com")).await;
        assert!(matches!(same_name, Err(AppError::Conflict(_))));

        let same_email = store.create_user(&user("bob", "alice@example.com")).await;
        assert!(matches!(same_email, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_find_by_credentials_requires_both() {
        let store = MemoryStore::new();
        let alice = user("alice", "alice@example.com");
        store.create_user(&alice).await.unwrap();

        assert!(store.find_by_credentials("alice", "digest").await.unwrap().is_some());
        assert!(store.find_by_credentials("alice", "wrong").await.unwrap().is_none());
        assert!(store.find_by_credentials("bob", "digest").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);

        let result = store
            .insert_refresh_token(&token(Uuid::new_v4(), "x", Utc::now()))
            .await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }
}
