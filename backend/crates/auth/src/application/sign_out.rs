//! Sign Out Use Case
//!
//! Revokes the session lineage behind the presented access token. The
//! access token itself stays valid until it expires; the refresh chain
//! does not.

use platform::client::ClientInfo;

use crate::application::context::AuthContext;
use crate::domain::entity::audit_event::AuditEventType;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::identity::Identity;
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> SignOutUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    /// Returns how many session records were still active
    pub async fn execute(&self, identity: &Identity, client: &ClientInfo) -> AuthResult<u64> {
        let revoked = self
            .ctx
            .sessions()
            .revoke_lineage(identity.lineage_id)
            .await?;

        let audit = self.ctx.audit();
        audit
            .record(
                audit
                    .event(AuditEventType::Logout, client.ip_string())
                    .with_username(identity.username.clone())
                    .with_metadata(serde_json::json!({
                        "sessionId": identity.session_id.to_string(),
                        "revoked": revoked,
                    })),
            )
            .await;

        tracing::info!(
            username = %identity.username,
            session_id = %identity.session_id,
            "User signed out"
        );
        Ok(revoked)
    }
}
