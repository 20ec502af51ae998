//! Change Password Use Case
//!
//! Replaces the password of the signed-in account and revokes every other
//! session lineage. The caller's own lineage survives.

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::application::context::AuthContext;
use crate::application::deadline::within;
use crate::domain::entity::audit_event::AuditEventType;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::{identity::Identity, user_name::UserName};
use crate::error::{AuthError, AuthResult};

pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug)]
pub struct ChangePasswordOutput {
    /// Sessions revoked in other lineages
    pub revoked_sessions: u64,
}

pub struct ChangePasswordUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> ChangePasswordUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(
        &self,
        identity: &Identity,
        input: ChangePasswordInput,
        client: &ClientInfo,
    ) -> AuthResult<ChangePasswordOutput> {
        if input.current_password.is_empty() || input.new_password.is_empty() {
            return Err(AuthError::Validation(
                "Current and new password are required".to_string(),
            ));
        }

        let username = UserName::from_db(&identity.username);
        let account = within(
            self.ctx.config.store_timeout,
            "find_account",
            self.ctx.repo.find_account(&username),
        )
        .await?
        .ok_or(AuthError::SessionInvalid)?;

        let current = ClearTextPassword::new(input.current_password);
        if !self
            .ctx
            .credentials
            .verify(&current, Some(&account.password_hash))
        {
            self.ctx
                .lockout()
                .record_failure(account.username.canonical())
                .await?;
            let audit = self.ctx.audit();
            audit
                .record(
                    audit
                        .event(AuditEventType::AuthFailure, client.ip_string())
                        .with_username(account.username.canonical())
                        .with_metadata(serde_json::json!({ "reason": "change_password_mismatch" })),
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        self.ctx.credentials.validate_policy(&input.new_password)?;
        let new_hash = self
            .ctx
            .credentials
            .hash(&ClearTextPassword::new(input.new_password))?;

        within(
            self.ctx.config.store_timeout,
            "update_password",
            self.ctx
                .repo
                .update_password(&account.username, &new_hash, self.ctx.now()),
        )
        .await?;

        let revoked_sessions = self
            .ctx
            .sessions()
            .revoke_all(account.username.canonical(), Some(identity.lineage_id))
            .await?;

        let audit = self.ctx.audit();
        audit
            .record(
                audit
                    .event(AuditEventType::PasswordChanged, client.ip_string())
                    .with_username(account.username.canonical())
                    .with_metadata(serde_json::json!({ "revokedSessions": revoked_sessions })),
            )
            .await;

        tracing::info!(
            username = %account.username,
            revoked_sessions,
            "Password changed"
        );

        Ok(ChangePasswordOutput { revoked_sessions })
    }
}
