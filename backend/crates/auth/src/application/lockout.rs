//! Lockout Guard
//!
//! Tracks consecutive failed logins per attempted user name and enforces the
//! temporary lock. Names without an account are tracked the same way, so the
//! lock response never tells a caller whether a name is registered. The
//! increment-and-lock step is a single store operation.

use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::domain::entity::login_failures::LockState;
use crate::domain::repository::LockoutRepository;
use crate::error::AuthResult;

pub struct LockoutGuard<R> {
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: LockoutRepository> LockoutGuard<R> {
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Seconds until `key` unlocks, `None` when not locked
    pub async fn lock_status(&self, key: &str) -> AuthResult<Option<u64>> {
        let failures = within(
            self.config.store_timeout,
            "find_login_failures",
            self.repo.find_login_failures(key),
        )
        .await?;
        let now = self.clock.now();
        Ok(failures.and_then(|f| f.lock_remaining_secs(now)))
    }

    pub async fn is_locked(&self, key: &str) -> AuthResult<bool> {
        Ok(self.lock_status(key).await?.is_some())
    }

    /// Count a failed login; trips the lock at the threshold
    pub async fn record_failure(&self, key: &str) -> AuthResult<LockState> {
        let state = within(
            self.config.store_timeout,
            "record_failed_login",
            self.repo
                .record_failed_login(key, self.clock.now(), &self.config.lockout),
        )
        .await?;

        if state.newly_locked {
            tracing::warn!(
                key,
                failed_attempts = state.failed_attempts,
                "Login locked after repeated failures"
            );
        } else {
            tracing::info!(
                key,
                failed_attempts = state.failed_attempts,
                "Failed login recorded"
            );
        }
        Ok(state)
    }

    /// Reset failures after a successful authentication
    pub async fn record_success(&self, key: &str) -> AuthResult<()> {
        within(
            self.config.store_timeout,
            "clear_failed_logins",
            self.repo.clear_failed_logins(key),
        )
        .await
    }
}
