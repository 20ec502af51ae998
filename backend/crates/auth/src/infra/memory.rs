//! In-Memory Repository Implementation
//!
//! Single-process store for tests and local development. Every operation
//! takes the one state lock, so each trait method is atomic.
//!
//! Rate-limit and failed-login counters are swept as they are touched.
//! Audit events are only removed by `prune_audit_events`, so a long-running
//! process keeps every event of the retention window in memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::{LineageId, SessionId};
use platform::crypto::constant_time_eq;
use platform::password::HashedPassword;
use platform::rate_limit::RateLimitCounter;
use tokio::sync::Mutex;

use crate::domain::entity::{
    account::Account,
    audit_event::AuditEvent,
    login_failures::{LockState, LockoutPolicy, LoginFailures},
    session::Session,
};
use crate::domain::repository::{
    AccountRepository, AuditRepository, LockoutRepository, RateLimitRepository,
    SessionRepository,
};
use crate::domain::value_object::user_name::UserName;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by canonical user name
    accounts: HashMap<String, Account>,
    /// Keyed by lockout key
    login_failures: HashMap<String, LoginFailures>,
    sessions: HashMap<SessionId, Session>,
    /// Counter and the window it was counted against
    rate_limits: HashMap<String, (RateLimitCounter, Duration)>,
    /// Append order
    audit_events: Vec<AuditEvent>,
}

impl MemoryState {
    /// Insert after revoking the oldest active sessions past `max_active`
    fn insert_session(
        &mut self,
        session: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let mut active: Vec<&mut Session> = self
            .sessions
            .values_mut()
            .filter(|s| s.username == session.username && s.is_active(now))
            .collect();
        active.sort_by_key(|s| (s.issued_at, *s.session_id.as_uuid()));

        let excess = (active.len() + 1).saturating_sub(max_active.max(1));
        let mut evicted = Vec::with_capacity(excess);
        for old in active.into_iter().take(excess) {
            old.revoked = true;
            evicted.push(old.clone());
        }

        self.sessions.insert(session.session_id, session.clone());
        Ok(evicted)
    }

    fn has_refresh_hash(&self, hash: &str) -> bool {
        self.sessions.values().any(|s| s.refresh_token_hash == hash)
    }
}

/// Mutex-guarded in-memory auth store
#[derive(Debug, Clone, Default)]
pub struct MemoryAuthRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for MemoryAuthRepository {
    async fn insert_account(&self, account: &Account) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        let key = account.username.canonical().to_string();
        if state.accounts.contains_key(&key) {
            return Err(AuthError::UserNameTaken);
        }
        state.accounts.insert(key, account.clone());
        Ok(())
    }

    async fn find_account(&self, username: &UserName) -> AuthResult<Option<Account>> {
        let state = self.state.lock().await;
        Ok(state.accounts.get(username.canonical()).cloned())
    }

    async fn update_password(
        &self,
        username: &UserName,
        password_hash: &HashedPassword,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        if let Some(account) = state.accounts.get_mut(username.canonical()) {
            account.update_password(password_hash.clone(), now);
        }
        Ok(())
    }
}

// ============================================================================
// Lockout Repository Implementation
// ============================================================================

impl LockoutRepository for MemoryAuthRepository {
    async fn find_login_failures(&self, key: &str) -> AuthResult<Option<LoginFailures>> {
        Ok(self.state.lock().await.login_failures.get(key).cloned())
    }

    async fn record_failed_login(
        &self,
        key: &str,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> AuthResult<LockState> {
        let mut state = self.state.lock().await;
        state.login_failures.retain(|k, f| k == key || !f.is_stale(now, policy));
        Ok(state
            .login_failures
            .entry(key.to_string())
            .or_insert_with(|| LoginFailures::new(key, now))
            .record_failure(now, policy))
    }

    async fn clear_failed_logins(&self, key: &str) -> AuthResult<()> {
        self.state.lock().await.login_failures.remove(key);
        Ok(())
    }

    async fn delete_stale_login_failures(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let len = state.login_failures.len();
        state
            .login_failures
            .retain(|_, f| f.updated_at >= before || f.locked_until.is_some_and(|u| u > before));
        Ok((len - state.login_failures.len()) as u64)
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for MemoryAuthRepository {
    async fn insert_session(
        &self,
        session: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let mut state = self.state.lock().await;
        if state.has_refresh_hash(&session.refresh_token_hash) {
            return Err(AuthError::Store("Duplicate refresh token hash".to_string()));
        }
        state.insert_session(session, max_active, now)
    }

    async fn rotate_session(
        &self,
        current: SessionId,
        successor: &Session,
        max_active: usize,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Vec<Session>>> {
        let mut state = self.state.lock().await;
        if state.has_refresh_hash(&successor.refresh_token_hash) {
            return Err(AuthError::Store("Duplicate refresh token hash".to_string()));
        }
        match state.sessions.get_mut(&current) {
            Some(session) if session.is_active(now) => session.revoked = true,
            _ => return Ok(None),
        }
        state.insert_session(successor, max_active, now).map(Some)
    }

    async fn find_session_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .find(|s| constant_time_eq(s.refresh_token_hash.as_bytes(), hash.as_bytes()))
            .cloned())
    }

    async fn list_active_sessions(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut sessions: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.username == username && s.is_active(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(sessions)
    }

    async fn revoke_session_if_active(
        &self,
        session_id: SessionId,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&session_id) {
            Some(session) if session.is_active(now) => {
                session.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_lineage(&self, lineage_id: LineageId) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut revoked = 0;
        for session in state
            .sessions
            .values_mut()
            .filter(|s| s.lineage_id == lineage_id && !s.revoked)
        {
            session.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke_account_sessions(
        &self,
        username: &str,
        except: Option<LineageId>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let mut revoked = 0;
        for session in state.sessions.values_mut().filter(|s| {
            s.username == username && !s.revoked && Some(s.lineage_id) != except
        }) {
            session.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let len = state.sessions.len();
        state.sessions.retain(|_, s| s.expires_at >= before);
        Ok((len - state.sessions.len()) as u64)
    }
}

// ============================================================================
// Rate Limit Repository Implementation
// ============================================================================

impl RateLimitRepository for MemoryAuthRepository {
    async fn hit_rate_limit(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> AuthResult<RateLimitCounter> {
        let mut state = self.state.lock().await;
        // Counters of elapsed windows carry nothing; drop them as we go
        state
            .rate_limits
            .retain(|k, (c, w)| k == key || !c.is_stale(now, *w));
        let counter = state
            .rate_limits
            .get(key)
            .map(|(c, _)| *c)
            .unwrap_or_else(|| RateLimitCounter::fresh(now))
            .hit(now, window);
        state
            .rate_limits
            .insert(key.to_string(), (counter, window));
        Ok(counter)
    }

    async fn delete_stale_rate_limits(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let len = state.rate_limits.len();
        state.rate_limits.retain(|_, (c, _)| c.window_start >= before);
        Ok((len - state.rate_limits.len()) as u64)
    }
}

// ============================================================================
// Audit Repository Implementation
// ============================================================================

impl AuditRepository for MemoryAuthRepository {
    async fn append_audit_event(&self, event: &AuditEvent) -> AuthResult<()> {
        self.state.lock().await.audit_events.push(event.clone());
        Ok(())
    }

    async fn list_audit_events(&self, limit: u32) -> AuthResult<Vec<AuditEvent>> {
        let state = self.state.lock().await;
        let mut events: Vec<AuditEvent> = state.audit_events.iter().rev().cloned().collect();
        // Stable sort keeps newest-appended first among equal timestamps
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit as usize);
        Ok(events)
    }

    async fn prune_audit_events(&self, before: DateTime<Utc>) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let len = state.audit_events.len();
        state.audit_events.retain(|e| e.timestamp >= before);
        Ok((len - state.audit_events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::client::ClientInfo;
    use platform::password::{ClearTextPassword, HashingCost};

    fn account(name: &str) -> Account {
        let hash = ClearTextPassword::new("Str0ng!Passw0rd".into())
            .hash(&HashingCost::testing(), None)
            .unwrap();
        Account::new(UserName::new(name).unwrap(), hash, false, Utc::now())
    }

    #[tokio::test]
    async fn test_concurrent_inserts_one_wins() {
        let repo = MemoryAuthRepository::new();
        let a = account("judy");
        let (first, second) = tokio::join!(repo.insert_account(&a), repo.insert_account(&a));
        assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
    }

    #[tokio::test]
    async fn test_failed_login_caps_and_clears() {
        let repo = MemoryAuthRepository::new();
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        // No account is needed for the counter
        let mut last = None;
        for _ in 0..7 {
            last = Some(repo.record_failed_login("kim", now, &policy).await.unwrap());
        }
        let state = last.unwrap();
        assert_eq!(state.failed_attempts, 5);
        assert!(state.locked_until.is_some());
        assert!(repo.find_login_failures("kim").await.unwrap().unwrap().is_locked(now));

        repo.clear_failed_logins("kim").await.unwrap();
        assert!(repo.find_login_failures("kim").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_counters_are_swept_on_write() {
        let repo = MemoryAuthRepository::new();
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let window = Duration::from_secs(60);

        repo.hit_rate_limit("login:192.0.2.1", now, window).await.unwrap();
        repo.record_failed_login("lee", now, &policy).await.unwrap();

        let later = now + chrono::Duration::hours(1);
        repo.hit_rate_limit("login:192.0.2.2", later, window).await.unwrap();
        repo.record_failed_login("max", later, &policy).await.unwrap();

        let state = repo.state.lock().await;
        assert_eq!(state.rate_limits.len(), 1);
        assert!(state.rate_limits.contains_key("login:192.0.2.2"));
        assert_eq!(state.login_failures.len(), 1);
        assert!(state.login_failures.contains_key("max"));
    }

    #[tokio::test]
    async fn test_revoked_sessions_stay_findable() {
        let repo = MemoryAuthRepository::new();
        let now = Utc::now();
        let session = Session::start(
            "kim",
            "abc".into(),
            chrono::Duration::days(7),
            false,
            &ClientInfo::default(),
            now,
        );
        repo.insert_session(&session, 5, now).await.unwrap();
        assert_eq!(repo.revoke_lineage(session.lineage_id).await.unwrap(), 1);

        let found = repo.find_session_by_refresh_hash("abc").await.unwrap().unwrap();
        assert!(found.revoked);
        assert!(repo.list_active_sessions("kim", now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_window_resets() {
        let repo = MemoryAuthRepository::new();
        let now = Utc::now();
        let window = Duration::from_secs(60);
        for expected in 1..=3 {
            let c = repo.hit_rate_limit("api:1.2.3.4", now, window).await.unwrap();
            assert_eq!(c.count, expected);
        }
        let later = now + chrono::Duration::seconds(60);
        let c = repo.hit_rate_limit("api:1.2.3.4", later, window).await.unwrap();
        assert_eq!(c.count, 1);
        assert_eq!(c.window_start, later);
    }
}
