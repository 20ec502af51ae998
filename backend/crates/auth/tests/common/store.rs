//! Memory store with switchable faults for integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use auth::MemoryAuthRepository;
use auth::domain::entity::account::Account;
use auth::domain::entity::audit_event::AuditEvent;
use auth::domain::entity::login_failures::{LockState, LockoutPolicy, LoginFailures};
use auth::domain::entity::session::Session;
use auth::domain::repository::{
    AccountRepository, AuditRepository, LockoutRepository, RateLimitRepository,
    SessionRepository,
};
use auth::domain::value_object::user_name::UserName;
use auth::error::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use kernel::id::{LineageId, SessionId};
use platform::password::HashedPassword;
use platform::rate_limit::RateLimitCounter;

/// Delegates to [`MemoryAuthRepository`]; account lookups can be made to
/// fail and session writes can be slowed down
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryAuthRepository,
    pub fail_lookups: Arc<AtomicBool>,
    /// Sleep before each session write, in milliseconds
    pub write_delay_ms: Arc<AtomicU64>,
}

impl FaultyStore {
    async fn write_delay(&self) {
        let ms = self.write_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

impl AccountRepository for FaultyStore {
    async fn insert_account(&self, account: &Account) -> AuthResult<()> {
        self.inner.insert_account(account).await
    }

    async fn find_account(&self, username: &UserName) -> AuthResult<Option<Account>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(AuthError::Store("connection to 10.0.0.5 refused".into()));
        }
        self.inner.find_account(username).await
    }

    async fn update_password(
        &self,
        username: &UserName,
        password_hash: &HashedPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        self.inner.update_password(username, password_hash, now).await
    }
}

impl LockoutRepository for FaultyStore {
    async fn find_login_failures(&self, key: &str) -> AuthResult<Option<LoginFailures>> {
        self.inner.find_login_failures(key).await
    }

    async fn record_failed_login(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> AuthResult<LockState> {
        self.inner.record_failed_login(key, now, policy).await
    }

    async fn clear_failed_logins(&self, key: &str) -> AuthResult<()> {
        self.inner.clear_failed_logins(key).await
    }

    async fn delete_stale_login_failures(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        self.inner.delete_stale_login_failures(before).await
    }
}

impl SessionRepository for FaultyStore {
    async fn insert_session(
        &self,
        session: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        self.write_delay().await;
        self.inner.insert_session(session, max_active, now).await
    }

    async fn rotate_session(
        &self,
        current: SessionId,
        successor: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Vec<Session>>> {
        self.write_delay().await;
        self.inner
            .rotate_session(current, successor, max_active, now)
            .await
    }

    async fn find_session_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        self.inner.find_session_by_refresh_hash(hash).await
    }

    async fn list_active_sessions(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        self.inner.list_active_sessions(username, now).await
    }

    async fn revoke_session_if_active(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        self.inner.revoke_session_if_active(session_id, now).await
    }

    async fn revoke_lineage(&self, lineage_id: LineageId) -> AuthResult<u64> {
        self.inner.revoke_lineage(lineage_id).await
    }

    async fn revoke_account_sessions(
        &self,
        username: &str,
        except: Option<LineageId>,
    ) -> AuthResult<u64> {
        self.inner.revoke_account_sessions(username, except).await
    }

    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        self.inner.delete_expired_sessions(before).await
    }
}

impl RateLimitRepository for FaultyStore {
    async fn hit_rate_limit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<RateLimitCounter> {
        self.inner.hit_rate_limit(key, now, window).await
    }

    async fn delete_stale_rate_limits(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        self.inner.delete_stale_rate_limits(before).await
    }
}

impl AuditRepository for FaultyStore {
    async fn append_audit_event(&self, event: &AuditEvent) -> AuthResult<()> {
        self.inner.append_audit_event(event).await
    }

    async fn list_audit_events(&self, limit: u32) -> AuthResult<Vec<AuditEvent>> {
        self.inner.list_audit_events(limit).await
    }

    async fn prune_audit_events(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        self.inner.prune_audit_events(before).await
    }
}
