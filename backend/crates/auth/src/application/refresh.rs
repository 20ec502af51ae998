//! Refresh Use Case
//!
//! Rotates a refresh token and reports reuse of revoked ones.

use platform::client::ClientInfo;

use crate::application::context::AuthContext;
use crate::application::token_service::{RefreshOutcome, TokenPair};
use crate::domain::entity::audit_event::AuditEventType;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};

/// Refresh use case
pub struct RefreshUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> RefreshUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<TokenPair> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::Validation("Refresh token is required".to_string()));
        }

        let audit = self.ctx.audit();
        match self.ctx.tokens().refresh(refresh_token.trim(), client).await? {
            RefreshOutcome::Rotated {
                tokens, evicted, ..
            } => {
                audit.record_evictions(&evicted, &client.ip_string()).await;
                Ok(tokens)
            }
            RefreshOutcome::Reused { session, revoked } => {
                audit
                    .record(
                        audit
                            .event(AuditEventType::RefreshTokenReuse, client.ip_string())
                            .with_username(session.username.clone())
                            .with_metadata(serde_json::json!({
                                "sessionId": session.session_id.to_string(),
                                "lineageId": session.lineage_id.to_string(),
                                "revokedSessions": revoked,
                            })),
                    )
                    .await;
                Err(AuthError::RefreshTokenReuse)
            }
        }
    }
}
