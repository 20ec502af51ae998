//! Repository Traits
//!
//! Interfaces for the external store. Implementations live in the
//! infrastructure layer. Every mutation that must be atomic with respect to
//! concurrent requests is a single trait method, so the store provides the
//! atomicity rather than a read-modify-write in the caller.
//!
//! Method names are unique across traits so a single store type can
//! implement all of them without ambiguity.

use chrono::{DateTime, Utc};
use kernel::id::{LineageId, SessionId};
use platform::password::HashedPassword;
use platform::rate_limit::RateLimitCounter;
use std::time::Duration;

use crate::domain::entity::{
    account::Account,
    audit_event::AuditEvent,
    login_failures::{LockState, LockoutPolicy, LoginFailures},
    session::Session,
};
use crate::domain::value_object::user_name::UserName;
use crate::error::AuthResult;

/// Account repository trait
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Insert a new account; a taken canonical user name is `UserNameTaken`
    async fn insert_account(&self, account: &Account) -> AuthResult<()>;

    /// Find account by canonical user name
    async fn find_account(&self, username: &UserName) -> AuthResult<Option<Account>>;

    /// Replace the password hash
    async fn update_password(
        &self,
        username: &UserName,
        password_hash: &HashedPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<()>;
}

/// Failed-login counter repository trait
///
/// Keys come from `lockout_key` and need not name an existing account.
#[trait_variant::make(LockoutRepository: Send)]
pub trait LocalLockoutRepository {
    async fn find_login_failures(&self, key: &str) -> AuthResult<Option<LoginFailures>>;

    /// Atomically count a failed login and apply the lock threshold,
    /// creating the counter on first failure
    async fn record_failed_login(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> AuthResult<LockState>;

    /// Reset failure count and lock
    async fn clear_failed_logins(&self, key: &str) -> AuthResult<()>;

    /// Delete counters last touched before `before` that hold no active lock
    async fn delete_stale_login_failures(&self, before: DateTime<Utc>) -> AuthResult<u64>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    /// Insert a session, first revoking the oldest active sessions of the
    /// same account so that at most `max_active` remain active afterwards
    ///
    /// Returns the evicted sessions.
    async fn insert_session(
        &self,
        session: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>>;

    /// Find by refresh-token hash, revoked sessions included
    async fn find_session_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>>;

    /// Active sessions of an account, most recently issued first
    async fn list_active_sessions(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>>;

    /// Revoke `current` if still active and insert `successor`, as one
    /// atomic step, with the same eviction as `insert_session`
    ///
    /// `None` when `current` was no longer active; nothing is written then.
    /// A concurrent `revoke_lineage` therefore either sees the successor or
    /// makes this call fail.
    async fn rotate_session(
        &self,
        current: SessionId,
        successor: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Vec<Session>>>;

    /// Compare-and-set revoke; `true` only for the caller that flipped it
    async fn revoke_session_if_active(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Revoke every session of a lineage, returns how many were active
    async fn revoke_lineage(&self, lineage_id: LineageId) -> AuthResult<u64>;

    /// Revoke every session of an account, optionally sparing one lineage
    async fn revoke_account_sessions(
        &self,
        username: &str,
        except: Option<LineageId>,
    ) -> AuthResult<u64>;

    /// Delete sessions that expired before `before`
    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> AuthResult<u64>;
}

/// Rate limit counter repository trait
#[trait_variant::make(RateLimitRepository: Send)]
pub trait LocalRateLimitRepository {
    /// Atomic increment-or-create for `key`
    ///
    /// A counter whose window has elapsed is reset to a fresh window in the
    /// same step. Returns the counter including this request.
    async fn hit_rate_limit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<RateLimitCounter>;

    /// Delete counters whose window started before `before`
    async fn delete_stale_rate_limits(&self, before: DateTime<Utc>) -> AuthResult<u64>;
}

/// Audit log repository trait
#[trait_variant::make(AuditRepository: Send)]
pub trait LocalAuditRepository {
    async fn append_audit_event(&self, event: &AuditEvent) -> AuthResult<()>;

    /// Most recent events first
    async fn list_audit_events(&self, limit: u32) -> AuthResult<Vec<AuditEvent>>;

    /// Delete events older than `before`
    async fn prune_audit_events(&self, before: DateTime<Utc>) -> AuthResult<u64>;
}

/// Everything the security core needs from one store
pub trait AuthStore:
    AccountRepository
    + LockoutRepository
    + SessionRepository
    + RateLimitRepository
    + AuditRepository
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: AccountRepository
        + LockoutRepository
        + SessionRepository
        + RateLimitRepository
        + AuditRepository
        + Send
        + Sync
        + 'static
{
}
