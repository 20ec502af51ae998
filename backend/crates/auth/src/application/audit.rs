//! Audit Logger
//!
//! Appends security events to the store. Recording never fails the
//! request that triggered it: a store error is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use platform::clock::Clock;

use crate::application::config::{AuthConfig, to_chrono};
use crate::application::deadline::within;
use crate::domain::entity::audit_event::{AuditEvent, AuditEventType};
use crate::domain::entity::session::Session;
use crate::domain::repository::AuditRepository;
use crate::error::AuthResult;

/// Upper bound for a single audit listing
pub const MAX_AUDIT_PAGE: u32 = 500;

pub struct AuditLogger<R> {
    repo: Arc<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R: AuditRepository> AuditLogger<R> {
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            config,
            clock,
        }
    }

    /// Start an event stamped with the current time
    pub fn event(&self, event_type: AuditEventType, client_ip: impl Into<String>) -> AuditEvent {
        AuditEvent::new(event_type, client_ip, self.clock.now())
    }

    /// Append an event; failures are logged, never returned
    pub async fn record(&self, event: AuditEvent) {
        tracing::info!(
            event_type = %event.event_type,
            client_ip = %event.client_ip,
            username = event.username.as_deref().unwrap_or("-"),
            path = event.path.as_deref().unwrap_or("-"),
            "Audit event"
        );

        let appended = within(
            self.config.store_timeout,
            "append_audit_event",
            self.repo.append_audit_event(&event),
        )
        .await;

        if let Err(e) = appended {
            tracing::warn!(
                event_type = %event.event_type,
                error = %e,
                "Failed to persist audit event"
            );
        }
    }

    /// One `session_evicted` event per session pushed out by a new login
    pub async fn record_evictions(&self, evicted: &[Session], client_ip: &str) {
        for session in evicted {
            let event = self
                .event(AuditEventType::SessionEvicted, client_ip)
                .with_username(session.username.clone())
                .with_metadata(serde_json::json!({
                    "sessionId": session.session_id.to_string(),
                    "issuedAt": session.issued_at,
                }));
            self.record(event).await;
        }
    }

    /// Most recent events first, capped at `MAX_AUDIT_PAGE`
    pub async fn recent(&self, limit: u32) -> AuthResult<Vec<AuditEvent>> {
        within(
            self.config.store_timeout,
            "list_audit_events",
            self.repo.list_audit_events(limit.clamp(1, MAX_AUDIT_PAGE)),
        )
        .await
    }

    /// Delete events older than `retention`
    pub async fn prune(&self, retention: Duration) -> AuthResult<u64> {
        let cutoff = self.clock.now() - to_chrono(retention);
        let deleted = within(
            self.config.store_timeout,
            "prune_audit_events",
            self.repo.prune_audit_events(cutoff),
        )
        .await?;
        if deleted > 0 {
            tracing::info!(deleted, "Pruned audit events");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::SigningSecret;
    use crate::error::AuthError;
    use crate::infra::memory::MemoryAuthRepository;
    use chrono::{DateTime, Utc};
    use platform::clock::ManualClock;

    fn logger() -> (AuditLogger<MemoryAuthRepository>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let config = Arc::new(AuthConfig::new(SigningSecret::new(vec![3u8; 32]).unwrap()));
        (
            AuditLogger::new(Arc::new(MemoryAuthRepository::new()), config, clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn test_recent_is_newest_first() {
        let (audit, clock) = logger();
        audit
            .record(audit.event(AuditEventType::Registration, "192.0.2.1").with_username("amy"))
            .await;
        clock.advance(Duration::from_secs(1));
        audit
            .record(audit.event(AuditEventType::LoginSuccess, "192.0.2.1").with_username("amy"))
            .await;

        let events = audit.recent(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::LoginSuccess);
        assert_eq!(events[1].event_type, AuditEventType::Registration);

        assert_eq!(audit.recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_respects_retention() {
        let (audit, clock) = logger();
        audit.record(audit.event(AuditEventType::Logout, "192.0.2.9")).await;
        clock.advance(Duration::from_secs(91 * 24 * 3600));
        audit.record(audit.event(AuditEventType::Logout, "192.0.2.9")).await;

        let deleted = audit.prune(Duration::from_secs(90 * 24 * 3600)).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(audit.recent(10).await.unwrap().len(), 1);
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl AuditRepository for BrokenStore {
        async fn append_audit_event(&self, _event: &AuditEvent) -> AuthResult<()> {
            Err(AuthError::Store("disk full".into()))
        }

        async fn list_audit_events(&self, _limit: u32) -> AuthResult<Vec<AuditEvent>> {
            Ok(Vec::new())
        }

        async fn prune_audit_events(&self, _before: DateTime<Utc>) -> AuthResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_record_swallows_store_errors() {
        let config = Arc::new(AuthConfig::new(SigningSecret::new(vec![3u8; 32]).unwrap()));
        let audit = AuditLogger::new(
            Arc::new(BrokenStore),
            config,
            Arc::new(ManualClock::starting_now()),
        );
        audit.record(audit.event(AuditEventType::ApiError, "unknown")).await;
    }
}
