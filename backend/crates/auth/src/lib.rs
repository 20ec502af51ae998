//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Security components and use cases
//! - `infra/` - Store implementations (PostgreSQL, in-memory)
//! - `presentation/` - HTTP handlers, DTOs, extractors, router
//!
//! ## Features
//! - Registration and login with user name + password
//! - Short-lived signed access tokens, rotating refresh tokens
//! - Refresh-token reuse detection (whole lineage revoked)
//! - Per-IP, per-action fixed-window rate limiting
//! - Account lockout after repeated failures
//! - Bounded concurrent sessions per account
//! - Security audit log with retention
//!
//! ## Security Model
//! - Passwords hashed with Argon2id, optional pepper
//! - Only SHA-256 hashes of refresh tokens are stored
//! - Unknown user names cost the same as wrong passwords
//! - Internal failures reach the client only as a correlation id

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::context::AuthContext;
pub use domain::value_object::identity::Identity;
pub use error::{AuthError, AuthResult};
pub use infra::{memory::MemoryAuthRepository, postgres::PgAuthRepository};
pub use presentation::router::auth_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod extract {
    pub use crate::presentation::extractor::*;
}
