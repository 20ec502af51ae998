//! Domain Layer
//!
//! Contains entities, value objects, and repository traits.

pub mod entity;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{account::Account, audit_event::AuditEvent, session::Session};
pub use repository::{
    AccountRepository, AuditRepository, AuthStore, RateLimitRepository, SessionRepository,
};
pub use value_object::{identity::Identity, user_name::UserName};
