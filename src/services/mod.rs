//! Business logic services layer

pub mod auth_service;
pub mod register_service;

pub use auth_service::AuthService;
pub use register_service::RegisterService;
