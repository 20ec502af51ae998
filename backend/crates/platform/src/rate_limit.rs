//! Rate Limiting Infrastructure
//!
//! Fixed-window counting: requests are counted in discrete, non-overlapping
//! buckets per key. Storage backends perform the increment atomically; the
//! arithmetic shared by every backend lives here.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Behaviour when the counter store cannot be reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Allow the request (availability over protection)
    Open,
    /// Deny the request
    Closed,
}

/// Rate limit configuration for one action
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
    /// What to do when the store is unavailable
    pub on_store_failure: FailMode,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration, on_store_failure: FailMode) -> Self {
        Self {
            max_requests,
            window,
            on_store_failure,
        }
    }

    /// Decide on a counter that already includes the current request
    pub fn decide(&self, counter: &RateLimitCounter, now: DateTime<Utc>) -> RateLimitDecision {
        let allowed = counter.count <= i64::from(self.max_requests);
        let remaining = i64::from(self.max_requests)
            .saturating_sub(counter.count)
            .max(0) as u32;

        RateLimitDecision {
            allowed,
            remaining,
            retry_after_secs: if allowed {
                0
            } else {
                counter.seconds_until_reset(now, self.window)
            },
        }
    }

    /// Decision used when the store failed
    pub fn on_failure(&self) -> RateLimitDecision {
        match self.on_store_failure {
            FailMode::Open => RateLimitDecision {
                allowed: true,
                remaining: 0,
                retry_after_secs: 0,
            },
            FailMode::Closed => RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after_secs: self.window.as_secs().max(1),
            },
        }
    }
}

/// Stored counter for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCounter {
    pub window_start: DateTime<Utc>,
    pub count: i64,
}

impl RateLimitCounter {
    /// A fresh window with no requests counted
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            count: 0,
        }
    }

    /// Whether the window this counter belongs to has elapsed
    pub fn is_stale(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.window_start).num_milliseconds()
            >= i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
    }

    /// Count one request, resetting first if the window elapsed
    pub fn hit(self, now: DateTime<Utc>, window: Duration) -> Self {
        let base = if self.is_stale(now, window) {
            Self::fresh(now)
        } else {
            self
        };
        Self {
            window_start: base.window_start,
            count: base.count + 1,
        }
    }

    /// Whole seconds until the window resets, rounded up, at least 1
    pub fn seconds_until_reset(&self, now: DateTime<Utc>, window: Duration) -> u64 {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        let elapsed_ms = now.signed_duration_since(self.window_start).num_milliseconds();
        let remaining_ms = window_ms.saturating_sub(elapsed_ms).max(0) as u64;
        remaining_ms.div_ceil(1000).max(1)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// Seconds until a request would be accepted (0 when allowed)
    pub retry_after_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap()
    }

    fn login_policy() -> RateLimitPolicy {
        RateLimitPolicy::new(5, Duration::from_secs(15 * 60), FailMode::Closed)
    }

    #[test]
    fn test_fifth_allowed_sixth_denied() {
        let policy = login_policy();
        let mut counter = RateLimitCounter::fresh(t0());
        for _ in 0..5 {
            counter = counter.hit(t0(), policy.window);
            assert!(policy.decide(&counter, t0()).allowed);
        }
        counter = counter.hit(t0(), policy.window);
        let decision = policy.decide(&counter, t0());
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, 15 * 60);
    }

    #[test]
    fn test_window_resets_at_boundary() {
        let policy = login_policy();
        let counter = RateLimitCounter {
            window_start: t0(),
            count: 9,
        };
        let later = t0() + chrono::Duration::minutes(15);
        assert!(counter.is_stale(later, policy.window));

        let counter = counter.hit(later, policy.window);
        assert_eq!(counter.count, 1);
        assert_eq!(counter.window_start, later);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let policy = login_policy();
        let counter = RateLimitCounter {
            window_start: t0(),
            count: 6,
        };
        let now = t0() + chrono::Duration::milliseconds(899_500);
        // 500 ms left in the window
        assert_eq!(policy.decide(&counter, now).retry_after_secs, 1);
    }

    #[test]
    fn test_remaining() {
        let policy = login_policy();
        let counter = RateLimitCounter {
            window_start: t0(),
            count: 2,
        };
        assert_eq!(policy.decide(&counter, t0()).remaining, 3);
    }

    #[test]
    fn test_fail_modes() {
        let closed = login_policy().on_failure();
        assert!(!closed.allowed);
        assert!(closed.retry_after_secs > 0);

        let open = RateLimitPolicy::new(100, Duration::from_secs(60), FailMode::Open).on_failure();
        assert!(open.allowed);
    }
}
