//! Session Registry
//!
//! Bounds concurrent sessions per account, lists and revokes them.

use std::sync::Arc;

use kernel::id::{LineageId, SessionId};
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::deadline::within;
use crate::domain::entity::session::Session;
use crate::domain::repository::SessionRepository;
use crate::error::AuthResult;

pub struct SessionRegistry<R> {
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: SessionRepository> SessionRegistry<R> {
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Store a session, evicting the oldest active ones past the limit
    ///
    /// Returns the evicted sessions.
    pub async fn register(&self, session: &Session) -> AuthResult<Vec<Session>> {
        let evicted = within(
            self.config.store_timeout,
            "insert_session",
            self.repo.insert_session(
                session,
                self.config.max_concurrent_sessions,
                self.clock.now(),
            ),
        )
        .await?;

        for old in &evicted {
            tracing::info!(
                username = %old.username,
                session_id = %old.session_id,
                "Evicted oldest session"
            );
        }
        Ok(evicted)
    }

    /// Replace `current` with `successor` in one store step
    ///
    /// `None` when `current` was no longer active.
    pub async fn rotate(
        &self,
        current: SessionId,
        successor: &Session,
    ) -> AuthResult<Option<Vec<Session>>> {
        let evicted = within(
            self.config.store_timeout,
            "rotate_session",
            self.repo.rotate_session(
                current,
                successor,
                self.config.max_concurrent_sessions,
                self.clock.now(),
            ),
        )
        .await?;

        for old in evicted.iter().flatten() {
            tracing::info!(
                username = %old.username,
                session_id = %old.session_id,
                "Evicted oldest session"
            );
        }
        Ok(evicted)
    }

    /// Active sessions, most recently issued first
    pub async fn list_active(&self, username: &str) -> AuthResult<Vec<Session>> {
        within(
            self.config.store_timeout,
            "list_active_sessions",
            self.repo.list_active_sessions(username, self.clock.now()),
        )
        .await
    }

    /// Revoke one session; `false` if it was not active
    pub async fn revoke(&self, session_id: SessionId) -> AuthResult<bool> {
        within(
            self.config.store_timeout,
            "revoke_session_if_active",
            self.repo.revoke_session_if_active(session_id, self.clock.now()),
        )
        .await
    }

    pub async fn revoke_lineage(&self, lineage_id: LineageId) -> AuthResult<u64> {
        within(
            self.config.store_timeout,
            "revoke_lineage",
            self.repo.revoke_lineage(lineage_id),
        )
        .await
    }

    /// Revoke every session of an account, optionally sparing one lineage
    pub async fn revoke_all(&self, username: &str, except: Option<LineageId>) -> AuthResult<u64> {
        let revoked = within(
            self.config.store_timeout,
            "revoke_account_sessions",
            self.repo.revoke_account_sessions(username, except),
        )
        .await?;
        tracing::info!(username, revoked, "Revoked account sessions");
        Ok(revoked)
    }

    /// Session older than the rotation interval
    pub fn rotation_overdue(&self, session: &Session) -> bool {
        session.rotation_overdue(self.clock.now(), self.config.rotation_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::SigningSecret;
    use crate::infra::memory::MemoryAuthRepository;
    use platform::client::ClientInfo;
    use platform::clock::ManualClock;
    use std::time::Duration;

    fn registry() -> (SessionRegistry<MemoryAuthRepository>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = Arc::new(AuthConfig::new(SigningSecret::new(vec![8u8; 32]).unwrap()));
        (
            SessionRegistry::new(Arc::new(MemoryAuthRepository::new()), config, clock.clone()),
            clock,
        )
    }

    fn session(clock: &ManualClock, n: usize) -> Session {
        Session::start(
            "dave",
            format!("hash-{n}"),
            chrono::Duration::days(7),
            false,
            &ClientInfo::default(),
            clock.now(),
        )
    }

    #[tokio::test]
    async fn test_sixth_session_evicts_oldest() {
        let (registry, clock) = registry();
        let mut created = Vec::new();
        for n in 0..5 {
            let s = session(&clock, n);
            assert!(registry.register(&s).await.unwrap().is_empty());
            created.push(s);
            clock.advance(Duration::from_secs(1));
        }

        let sixth = session(&clock, 5);
        let evicted = registry.register(&sixth).await.unwrap();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].session_id, created[0].session_id);

        let active = registry.list_active("dave").await.unwrap();
        assert_eq!(active.len(), 5);
        assert!(active.iter().all(|s| s.session_id != created[0].session_id));
        // Most recent first
        assert_eq!(active[0].session_id, sixth.session_id);
        assert!(active.windows(2).all(|w| w[0].issued_at >= w[1].issued_at));
    }

    #[tokio::test]
    async fn test_revoke_all_except_lineage() {
        let (registry, clock) = registry();
        let keep = session(&clock, 0);
        registry.register(&keep).await.unwrap();
        for n in 1..4 {
            registry.register(&session(&clock, n)).await.unwrap();
        }

        let revoked = registry.revoke_all("dave", Some(keep.lineage_id)).await.unwrap();
        assert_eq!(revoked, 3);

        let active = registry.list_active("dave").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, keep.session_id);
    }

    #[tokio::test]
    async fn test_rotate_only_once() {
        let (registry, clock) = registry();
        let s = session(&clock, 0);
        registry.register(&s).await.unwrap();

        let ttl = chrono::Duration::days(7);
        let client = ClientInfo::default();
        let first = s.successor("hash-a".into(), ttl, &client, clock.now());
        assert_eq!(registry.rotate(s.session_id, &first).await.unwrap(), Some(Vec::new()));

        // The loser writes nothing
        let second = s.successor("hash-b".into(), ttl, &client, clock.now());
        assert!(registry.rotate(s.session_id, &second).await.unwrap().is_none());

        let active = registry.list_active("dave").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, first.session_id);
    }

    #[tokio::test]
    async fn test_revoke_is_compare_and_set() {
        let (registry, clock) = registry();
        let s = session(&clock, 0);
        registry.register(&s).await.unwrap();
        assert!(registry.revoke(s.session_id).await.unwrap());
        assert!(!registry.revoke(s.session_id).await.unwrap());
    }
}
