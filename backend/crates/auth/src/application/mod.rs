//! Application Layer
//!
//! Components of the security core and the use cases built on them.

pub mod audit;
pub mod audit_log;
pub mod change_password;
pub mod config;
pub mod context;
pub mod credential;
pub(crate) mod deadline;
pub mod forgot_password;
pub mod list_sessions;
pub mod lockout;
pub mod maintenance;
pub mod rate_limiter;
pub mod refresh;
pub mod session_registry;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub mod token_service;

// Re-exports
pub use audit::AuditLogger;
pub use audit_log::ListAuditEventsUseCase;
pub use change_password::{ChangePasswordInput, ChangePasswordOutput, ChangePasswordUseCase};
pub use config::AuthConfig;
pub use context::AuthContext;
pub use credential::CredentialVerifier;
pub use forgot_password::ForgotPasswordUseCase;
pub use list_sessions::ListSessionsUseCase;
pub use lockout::LockoutGuard;
pub use maintenance::{MaintenanceReport, run_maintenance};
pub use rate_limiter::RateLimiter;
pub use refresh::RefreshUseCase;
pub use session_registry::SessionRegistry;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};
pub use token_service::{Claims, IssuedSession, RefreshOutcome, TokenPair, TokenService};
