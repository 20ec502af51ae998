//! Audit Event Entity
//!
//! Append-only record of security-relevant activity.

use chrono::{DateTime, Utc};
use derive_more::Display;
use kernel::id::AuditEventId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    #[display("request")]
    Request,
    #[display("auth_failure")]
    AuthFailure,
    #[display("unauthorized_admin_access")]
    UnauthorizedAdminAccess,
    #[display("lockout")]
    Lockout,
    #[display("api_error")]
    ApiError,
    #[display("rate_limited")]
    RateLimited,
    #[display("refresh_token_reuse")]
    RefreshTokenReuse,
    #[display("session_evicted")]
    SessionEvicted,
    #[display("password_changed")]
    PasswordChanged,
    #[display("password_reset_requested")]
    PasswordResetRequested,
    #[display("registration")]
    Registration,
    #[display("login_success")]
    LoginSuccess,
    #[display("logout")]
    Logout,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 13] = [
        Self::Request,
        Self::AuthFailure,
        Self::UnauthorizedAdminAccess,
        Self::Lockout,
        Self::ApiError,
        Self::RateLimited,
        Self::RefreshTokenReuse,
        Self::SessionEvicted,
        Self::PasswordChanged,
        Self::PasswordResetRequested,
        Self::Registration,
        Self::LoginSuccess,
        Self::Logout,
    ];
}

/// Unrecognised event type name read back from storage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown audit event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for AuditEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.to_string() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Audit event entity
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub event_type: AuditEventType,
    pub client_ip: String,
    pub username: Option<String>,
    pub path: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Free-form details (never secrets)
    pub metadata: serde_json::Value,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, client_ip: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AuditEventId::new(),
            event_type,
            client_ip: client_ip.into(),
            username: None,
            path: None,
            timestamp: now,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names_roundtrip() {
        for t in AuditEventType::ALL {
            assert_eq!(t.to_string().parse::<AuditEventType>().unwrap(), t);
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                serde_json::Value::String(t.to_string())
            );
        }
        assert!("nope".parse::<AuditEventType>().is_err());
    }

    #[test]
    fn test_builder() {
        let event = AuditEvent::new(AuditEventType::Lockout, "10.0.0.1", Utc::now())
            .with_username("alice")
            .with_path("/auth/login")
            .with_metadata(serde_json::json!({ "failedAttempts": 5 }));
        assert_eq!(event.username.as_deref(), Some("alice"));
        assert_eq!(event.path.as_deref(), Some("/auth/login"));
        assert_eq!(event.metadata["failedAttempts"], 5);
    }
}
