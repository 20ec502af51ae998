//! Application Configuration
//!
//! Immutable configuration for the security core, built once at startup and
//! shared as `Arc<AuthConfig>`.

use std::fmt;
use std::time::Duration;

use platform::crypto::from_base64;
use platform::password::{HashingCost, PasswordPolicy};
use platform::rate_limit::{FailMode, RateLimitPolicy};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use crate::domain::entity::login_failures::LockoutPolicy;
use crate::domain::value_object::rate_limit_action::RateLimitAction;

/// Minimum signing secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Signing secret errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("Signing secret is not valid base64")]
    InvalidEncoding,
    #[error("Signing secret must be at least {MIN_SECRET_LEN} bytes (got {0})")]
    TooShort(usize),
}

/// HMAC key for access tokens
///
/// Must come from persisted configuration. There is no generated fallback:
/// a per-process secret would silently invalidate every outstanding token
/// on restart.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: Vec<u8>) -> Result<Self, SecretError> {
        if bytes.len() < MIN_SECRET_LEN {
            return Err(SecretError::TooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Decode from standard base64
    pub fn from_base64(encoded: &str) -> Result<Self, SecretError> {
        let bytes = from_base64(encoded).map_err(|_| SecretError::InvalidEncoding)?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningSecret").field(&"[REDACTED]").finish()
    }
}

/// Rate limit policy per action
#[derive(Debug, Clone)]
pub struct RateLimitTable {
    pub login: RateLimitPolicy,
    pub registration: RateLimitPolicy,
    pub password_reset: RateLimitPolicy,
    pub api: RateLimitPolicy,
}

impl Default for RateLimitTable {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::new(5, Duration::from_secs(15 * 60), FailMode::Closed),
            registration: RateLimitPolicy::new(3, Duration::from_secs(3600), FailMode::Closed),
            password_reset: RateLimitPolicy::new(3, Duration::from_secs(3600), FailMode::Closed),
            api: RateLimitPolicy::new(100, Duration::from_secs(60), FailMode::Open),
        }
    }
}

impl RateLimitTable {
    pub fn get(&self, action: RateLimitAction) -> &RateLimitPolicy {
        match action {
            RateLimitAction::Login => &self.login,
            RateLimitAction::Registration => &self.registration,
            RateLimitAction::PasswordReset => &self.password_reset,
            RateLimitAction::Api => &self.api,
        }
    }

    /// Longest window in the table (stale-counter cutoff)
    pub fn longest_window(&self) -> Duration {
        [
            &self.login,
            &self.registration,
            &self.password_reset,
            &self.api,
        ]
        .iter()
        .map(|p| p.window)
        .max()
        .unwrap_or_default()
    }
}

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Access-token signing key
    pub signing_secret: SigningSecret,
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (7 days)
    pub refresh_token_ttl: Duration,
    /// Refresh token lifetime with "Remember Me" (30 days)
    pub refresh_token_ttl_remember_me: Duration,
    /// A session record older than this is revoked on its next use (24 hours)
    pub session_rotation_interval: Duration,
    /// Active sessions allowed per account
    pub max_concurrent_sessions: usize,
    pub lockout: LockoutPolicy,
    pub password_policy: PasswordPolicy,
    /// Argon2id cost, fixed per deployment
    pub password_hashing: HashingCost,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    pub rate_limits: RateLimitTable,
    /// Audit events older than this are pruned (90 days)
    pub audit_retention: Duration,
    /// Record a `request` audit event for every gated call
    pub audit_requests: bool,
    /// Deadline for each store call
    pub store_timeout: Duration,
    /// Reverse proxies in front of the server that append to
    /// X-Forwarded-For; 0 uses the peer address only
    pub trusted_proxy_hops: usize,
}

impl AuthConfig {
    /// Configuration with default lifetimes and limits
    pub fn new(signing_secret: SigningSecret) -> Self {
        Self {
            signing_secret,
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 3600),
            refresh_token_ttl_remember_me: Duration::from_secs(30 * 24 * 3600),
            session_rotation_interval: Duration::from_secs(24 * 3600),
            max_concurrent_sessions: 5,
            lockout: LockoutPolicy::default(),
            password_policy: PasswordPolicy::default(),
            password_hashing: HashingCost::default(),
            password_pepper: None,
            rate_limits: RateLimitTable::default(),
            audit_retention: Duration::from_secs(90 * 24 * 3600),
            audit_requests: false,
            store_timeout: Duration::from_secs(2),
            trusted_proxy_hops: 0,
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }

    /// Refresh token lifetime for a session
    pub fn refresh_ttl(&self, remember_me: bool) -> chrono::Duration {
        let ttl = if remember_me {
            self.refresh_token_ttl_remember_me
        } else {
            self.refresh_token_ttl
        };
        to_chrono(ttl)
    }

    pub fn rotation_interval(&self) -> chrono::Duration {
        to_chrono(self.session_rotation_interval)
    }
}

pub(crate) fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}
