//! Session Entity
//!
//! One generation of a refresh token. Each rotation revokes the current
//! record and creates a successor that shares the lineage id, so a login
//! is a chain of session records.

use chrono::{DateTime, Duration, Utc};
use kernel::id::{LineageId, SessionId};
use platform::client::ClientInfo;

/// Session entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: SessionId,
    /// Shared by every rotation of one login
    pub lineage_id: LineageId,
    /// Canonical user name of the owning account
    pub username: String,
    /// SHA-256 hex of the refresh token (raw token is never stored)
    pub refresh_token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub remember_me: bool,
    pub revoked: bool,
}

impl Session {
    /// First session of a new lineage (login)
    pub fn start(
        username: impl Into<String>,
        refresh_token_hash: String,
        ttl: Duration,
        remember_me: bool,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            lineage_id: LineageId::new(),
            username: username.into(),
            refresh_token_hash,
            issued_at: now,
            expires_at: now + ttl,
            client_ip: client.ip.map(|ip| ip.to_string()),
            user_agent: client.user_agent.clone(),
            remember_me,
            revoked: false,
        }
    }

    /// Next generation in the same lineage (refresh)
    pub fn successor(
        &self,
        refresh_token_hash: String,
        ttl: Duration,
        client: &ClientInfo,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            lineage_id: self.lineage_id,
            username: self.username.clone(),
            refresh_token_hash,
            issued_at: now,
            expires_at: now + ttl,
            client_ip: client
                .ip
                .map(|ip| ip.to_string())
                .or_else(|| self.client_ip.clone()),
            user_agent: client
                .user_agent
                .clone()
                .or_else(|| self.user_agent.clone()),
            remember_me: self.remember_me,
            revoked: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Not revoked and not expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }

    /// Older than the rotation interval; must re-authenticate
    pub fn rotation_overdue(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        now.signed_duration_since(self.issued_at) > interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: Some("198.51.100.7".parse().unwrap()),
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[test]
    fn test_successor_shares_lineage() {
        let first = Session::start("alice", "h1".into(), Duration::days(7), false, &client(), t0());
        let later = t0() + Duration::hours(1);
        let next = first.successor("h2".into(), Duration::days(7), &ClientInfo::default(), later);

        assert_eq!(next.lineage_id, first.lineage_id);
        assert_ne!(next.session_id, first.session_id);
        assert_eq!(next.issued_at, later);
        assert_eq!(next.expires_at, later + Duration::days(7));
        // Falls back to the previous client details
        assert_eq!(next.client_ip.as_deref(), Some("198.51.100.7"));
        assert!(!next.revoked);
    }

    #[test]
    fn test_expiry_and_activity() {
        let mut session =
            Session::start("alice", "h".into(), Duration::days(7), false, &client(), t0());
        assert!(session.is_active(t0()));
        assert!(!session.is_expired(t0() + Duration::days(7)));
        assert!(session.is_expired(t0() + Duration::days(7) + Duration::seconds(1)));

        session.revoked = true;
        assert!(!session.is_active(t0()));
    }

    #[test]
    fn test_rotation_overdue() {
        let session = Session::start("alice", "h".into(), Duration::days(30), true, &client(), t0());
        assert!(!session.rotation_overdue(t0() + Duration::hours(24), Duration::hours(24)));
        assert!(session.rotation_overdue(
            t0() + Duration::hours(24) + Duration::seconds(1),
            Duration::hours(24)
        ));
    }
}
