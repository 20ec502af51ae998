//! Presentation Layer
//!
//! HTTP handlers, DTOs, extractors, router, and middleware.

pub mod dto;
pub mod extractor;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use extractor::{AdminUser, AuthenticatedUser, RequestClient, bearer_token};
pub use middleware::{PolicyState, enforce_policy};
pub use router::{AuthLevel, Endpoint, auth_router};
