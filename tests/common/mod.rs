//! 测试公共模块
//! 提供测试辅助函数和测试工具
#![allow(dead_code)]

use chrono::Duration;
use secrecy::Secret;
use socialnet::{
    auth::{
        clock::{Clock, ManualClock},
        password::CredentialHasher,
    },
    config::{
        AppConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig,
        MEMORY_DATABASE_URL,
    },
    middleware::AppState,
    models::user::User,
    repository::{MemoryStore, UserQueries},
};
use std::sync::Arc;
use uuid::Uuid;

pub const ACCESS_TTL_MINUTES: i64 = 15;
pub const REFRESH_TTL_MINUTES: i64 = 60;

/// 创建测试配置
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
        },
        database: DatabaseConfig {
            url: Secret::new(MEMORY_DATABASE_URL.to_string()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            token_secret: Secret::new("test-secret-key-for-testing-only-min-32-chars".to_string()),
            password_salt: Secret::new("test-salt-0123456789".to_string()),
            access_token_exp_secs: (ACCESS_TTL_MINUTES * 60) as u64,
            refresh_token_exp_secs: (REFRESH_TTL_MINUTES * 60) as u64,
            refresh_token_length: 128,
            cookie_secure: false,
        },
    }
}

/// Application state over an in-memory store and a hand-driven clock
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = create_test_config();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());

        let state = AppState::new(config, None, store.clone(), store.clone(), clock.clone())
            .expect("Failed to build test app state");

        Self {
            state: Arc::new(state),
            store,
            clock,
        }
    }

    pub fn router(&self) -> axum::Router {
        socialnet::routes::create_router(self.state.clone())
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    /// Insert a user directly, skipping registration input rules
    pub async fn create_test_user(&self, username: &str, password: &str) -> Uuid {
        let hasher = CredentialHasher::from_config(&self.state.config)
            .expect("Failed to build credential hasher");

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_digest: hasher.hash(password),
            email: format!("{}@example.com", username),
            last_seen: self.clock.now(),
        };

        self.store
            .create_user(&user)
            .await
            .expect("Failed to create test user")
    }
}

/// Flip one character in the middle of the signature segment
pub fn tamper_signature(token: &str) -> String {
    let signature_start = token.rfind('.').expect("token has no signature") + 1;
    let index = signature_start + (token.len() - signature_start) / 2;

    let mut bytes = token.as_bytes().to_vec();
    bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
    String::from_utf8(bytes).expect("token is ascii")
}
