//! Login Failure Tracking
//!
//! Consecutive failed logins per attempted user name. Tracked whether or not
//! an account with that name exists, so a lock never reveals which names are
//! registered.

use chrono::{DateTime, Utc};
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

use crate::domain::value_object::user_name::UserName;

/// Lockout thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trip the lock
    pub max_failed_attempts: u32,
    /// How long the lock holds
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_duration: Duration::from_secs(30 * 60),
        }
    }
}

impl LockoutPolicy {
    pub fn lock_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::from_std(self.lockout_duration)
            .unwrap_or_else(|_| chrono::Duration::minutes(30))
    }
}

/// Lockout state after a failed attempt was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    /// This failure tripped the lock
    pub newly_locked: bool,
}

/// Key the failure counter is stored under
///
/// The canonical user name when the input is a valid name, otherwise the
/// input folded the same way (NFKC, trimmed, lowercased), so every spelling
/// of one name shares a counter.
pub fn lockout_key(raw: &str) -> String {
    match UserName::new(raw) {
        Ok(name) => name.canonical().to_string(),
        Err(_) => raw.nfkc().collect::<String>().trim().to_lowercase(),
    }
}

/// Failure counter for one lockout key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailures {
    pub key: String,
    /// Consecutive failed logins, capped at the lockout threshold
    pub failed_attempts: u32,
    /// Authentication is refused while `now < locked_until`
    pub locked_until: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LoginFailures {
    pub fn new(key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            failed_attempts: 0,
            locked_until: None,
            updated_at: now,
        }
    }

    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }

    /// Whole seconds until the lock lifts, rounded up
    pub fn lock_remaining_secs(&self, now: DateTime<Utc>) -> Option<u64> {
        let until = self.locked_until.filter(|until| now < *until)?;
        let ms = until.signed_duration_since(now).num_milliseconds().max(0) as u64;
        Some(ms.div_ceil(1000).max(1))
    }

    /// Count one failed login
    ///
    /// A stale counter (see [`Self::is_stale`]) starts a fresh count. While a
    /// lock holds, nothing changes.
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) -> LockState {
        if self.is_locked(now) {
            return LockState {
                failed_attempts: self.failed_attempts,
                locked_until: self.locked_until,
                newly_locked: false,
            };
        }

        let base = if self.is_stale(now, policy) {
            0
        } else {
            self.failed_attempts
        };
        let attempts = (base + 1).min(policy.max_failed_attempts);
        let newly_locked = attempts >= policy.max_failed_attempts;

        self.failed_attempts = attempts;
        self.locked_until = newly_locked.then(|| policy.lock_until(now));
        self.updated_at = now;

        LockState {
            failed_attempts: attempts,
            locked_until: self.locked_until,
            newly_locked,
        }
    }

    /// The lock elapsed, or no failure was seen for one lockout duration
    pub fn is_stale(&self, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
        match self.locked_until {
            Some(until) => until <= now,
            None => policy.lock_until(self.updated_at) <= now,
        }
    }
}
