//! Shared application context
//!
//! Everything a request needs, wired once at startup: the store, the
//! immutable configuration, the clock and the credential verifier.
//! Components are cheap views over it and are built per request.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::clock::{Clock, SystemClock};

use crate::application::audit::AuditLogger;
use crate::application::config::AuthConfig;
use crate::application::credential::CredentialVerifier;
use crate::application::lockout::LockoutGuard;
use crate::application::rate_limiter::RateLimiter;
use crate::application::session_registry::SessionRegistry;
use crate::application::token_service::TokenService;
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;

/// Shared state for the auth core (also the axum router state)
pub struct AuthContext<R> {
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub clock: Arc<dyn Clock>,
    pub credentials: Arc<CredentialVerifier>,
}

impl<R> Clone for AuthContext<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            config: Arc::clone(&self.config),
            clock: Arc::clone(&self.clock),
            credentials: Arc::clone(&self.credentials),
        }
    }
}

impl<R: AuthStore> AuthContext<R> {
    pub fn new(repo: R, config: AuthConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let credentials = CredentialVerifier::new(&config)?;
        Ok(Self {
            repo: Arc::new(repo),
            config: Arc::new(config),
            clock,
            credentials: Arc::new(credentials),
        })
    }

    /// Context reading the wall clock
    pub fn with_system_clock(repo: R, config: AuthConfig) -> AuthResult<Self> {
        Self::new(repo, config, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn rate_limiter(&self) -> RateLimiter<R> {
        RateLimiter::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn lockout(&self) -> LockoutGuard<R> {
        LockoutGuard::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn sessions(&self) -> SessionRegistry<R> {
        SessionRegistry::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn tokens(&self) -> TokenService<R> {
        TokenService::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }

    pub fn audit(&self) -> AuditLogger<R> {
        AuditLogger::new(self.repo.clone(), self.config.clone(), self.clock.clone())
    }
}
