//! Rate Limiter
//!
//! Fixed-window counters keyed by (client IP, action). The store performs
//! the increment-or-create atomically; a counter that reaches the store
//! already includes the current request, so two concurrent requests can
//! never both observe `max - 1`.

use std::sync::Arc;

use platform::clock::Clock;
use platform::rate_limit::{FailMode, RateLimitDecision};

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::domain::repository::RateLimitRepository;
use crate::domain::value_object::rate_limit_action::RateLimitAction;

pub struct RateLimiter<R> {
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: RateLimitRepository> RateLimiter<R> {
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Count this request and decide whether it may proceed
    ///
    /// Store failures and timeouts follow the action's `FailMode`.
    pub async fn check(&self, client_ip: &str, action: RateLimitAction) -> RateLimitDecision {
        let policy = self.config.rate_limits.get(action);
        let key = action.key(client_ip);
        let now = self.clock.now();

        let counted = within(
            self.config.store_timeout,
            "hit_rate_limit",
            self.repo.hit_rate_limit(&key, now, policy.window),
        )
        .await;

        match counted {
            Ok(counter) => {
                let decision = policy.decide(&counter, now);
                if !decision.allowed {
                    tracing::warn!(
                        client_ip,
                        action = %action,
                        count = counter.count,
                        max = policy.max_requests,
                        retry_after = decision.retry_after_secs,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(e) => {
                let decision = policy.on_failure();
                match policy.on_store_failure {
                    FailMode::Open => tracing::warn!(
                        error = %e,
                        action = %action,
                        "Rate limit store unavailable, failing open"
                    ),
                    FailMode::Closed => tracing::error!(
                        error = %e,
                        action = %action,
                        "Rate limit store unavailable, failing closed"
                    ),
                }
                decision
            }
        }
    }
}
