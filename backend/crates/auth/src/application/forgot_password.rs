//! Forgot Password Use Case
//!
//! Records the request and answers identically whether or not the account
//! exists. Delivery of a reset link belongs to a notification service this
//! crate does not own.

use platform::client::ClientInfo;

use crate::application::context::AuthContext;
use crate::application::deadline::within;
use crate::domain::entity::audit_event::AuditEventType;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_name::UserName;
use crate::error::AuthResult;

/// The one message every caller receives
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If the account exists, password reset instructions have been sent";

pub struct ForgotPasswordUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> ForgotPasswordUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, username: &str, client: &ClientInfo) -> AuthResult<&'static str> {
        let account_exists = match UserName::new(username) {
            Ok(name) => within(
                self.ctx.config.store_timeout,
                "find_account",
                self.ctx.repo.find_account(&name),
            )
            .await?
            .is_some(),
            Err(_) => false,
        };

        let audit = self.ctx.audit();
        let mut event = audit
            .event(AuditEventType::PasswordResetRequested, client.ip_string())
            .with_metadata(serde_json::json!({ "accountExists": account_exists }));
        if !username.trim().is_empty() {
            event = event.with_username(username.trim());
        }
        audit.record(event).await;

        Ok(FORGOT_PASSWORD_MESSAGE)
    }
}
