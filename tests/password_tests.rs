//! 密码摘要测试
//!
//! 测试加盐 SHA-512 摘要

use secrecy::Secret;
use socialnet::auth::password::CredentialHasher;
use socialnet::error::AppError;

mod common;
use common::create_test_config;

#[test]
fn test_known_digest() {
    let hasher = CredentialHasher::from_config(&create_test_config()).unwrap();

    // sha512("p1" || "test-salt-0123456789")
    assert_eq!(
        hasher.hash("p1"),
        "80a8ed6391ea4f3dcb04b04a091a9bb4ab20faef1755f92e4560f3bb18cfc307\
         3688a2c33635a3823ec684b1bd654c144d43a21487eb553150007462ef7b0f25"
    );
}

#[test]
fn test_digest_is_lowercase_hex() {
    let hasher = CredentialHasher::from_config(&create_test_config()).unwrap();
    let digest = hasher.hash("correct horse");

    assert_eq!(digest.len(), 128);
    assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

#[test]
fn test_digest_empty_and_unicode() {
    let hasher = CredentialHasher::from_config(&create_test_config()).unwrap();

    assert_eq!(hasher.hash("").len(), 128);
    assert_ne!(hasher.hash("密码🔐"), hasher.hash("密码"));
}

#[test]
fn test_salt_too_short_is_config_error() {
    let mut config = create_test_config();
    config.security.password_salt = Secret::new("short".to_string());

    let result = CredentialHasher::from_config(&config);
    assert!(matches!(result, Err(AppError::Config(_))));
}
