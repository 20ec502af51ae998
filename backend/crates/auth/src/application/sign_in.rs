//! Sign In Use Case
//!
//! Authenticates a user and opens a session lineage.
//!
//! Unknown user names and wrong passwords produce the same error, the same
//! Argon2 work and the same failure count. A locked name is refused before
//! the account is looked up.

use kernel::id::SessionId;
use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::application::context::AuthContext;
use crate::application::deadline::within;
use crate::application::token_service::TokenPair;
use crate::domain::entity::{
    account::Account, audit_event::AuditEventType, login_failures::lockout_key,
};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_name::UserName;
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub username: String,
    pub password: String,
    /// Longer refresh token lifetime
    pub remember_me: bool,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub tokens: TokenPair,
    pub session_id: SessionId,
}

/// Sign in use case
pub struct SignInUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> SignInUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, input: SignInInput, client: &ClientInfo) -> AuthResult<SignInOutput> {
        if input.username.trim().is_empty() || input.password.is_empty() {
            return Err(AuthError::Validation(
                "Username and password are required".to_string(),
            ));
        }

        let key = lockout_key(&input.username);
        let lockout = self.ctx.lockout();
        if let Some(retry_after) = lockout.lock_status(&key).await? {
            self.audit_failure(&key, "account_locked", client).await;
            return Err(AuthError::AccountLocked { retry_after });
        }

        let password = ClearTextPassword::new(input.password);
        let account = match UserName::new(&input.username) {
            Ok(username) => {
                within(
                    self.ctx.config.store_timeout,
                    "find_account",
                    self.ctx.repo.find_account(&username),
                )
                .await?
            }
            Err(_) => None,
        };

        // Without an account this verifies against a dummy hash, same cost
        let verified = self
            .ctx
            .credentials
            .verify(&password, account.as_ref().map(|a| &a.password_hash));

        let account = match account {
            Some(account) if verified => account,
            account => {
                let state = lockout.record_failure(&key).await?;
                if state.newly_locked {
                    let audit = self.ctx.audit();
                    audit
                        .record(
                            audit
                                .event(AuditEventType::Lockout, client.ip_string())
                                .with_username(key.as_str())
                                .with_metadata(serde_json::json!({
                                    "failedAttempts": state.failed_attempts,
                                    "lockedUntil": state.locked_until,
                                })),
                        )
                        .await;
                }
                let reason = if account.is_some() {
                    "invalid_password"
                } else {
                    "unknown_user"
                };
                self.audit_failure(&key, reason, client).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        lockout.record_success(&key).await?;
        self.upgrade_hash(&account, &password).await;

        let issued = self
            .ctx
            .tokens()
            .issue(&account, input.remember_me, client)
            .await?;

        let audit = self.ctx.audit();
        audit.record_evictions(&issued.evicted, &client.ip_string()).await;
        audit
            .record(
                audit
                    .event(AuditEventType::LoginSuccess, client.ip_string())
                    .with_username(account.username.canonical())
                    .with_metadata(serde_json::json!({
                        "sessionId": issued.session.session_id.to_string(),
                        "rememberMe": input.remember_me,
                    })),
            )
            .await;

        tracing::info!(
            username = %account.username,
            session_id = %issued.session.session_id,
            remember_me = input.remember_me,
            "User signed in"
        );

        Ok(SignInOutput {
            tokens: issued.tokens,
            session_id: issued.session.session_id,
        })
    }

    async fn audit_failure(&self, username: &str, reason: &str, client: &ClientInfo) {
        let audit = self.ctx.audit();
        audit
            .record(
                audit
                    .event(AuditEventType::AuthFailure, client.ip_string())
                    .with_username(username)
                    .with_metadata(serde_json::json!({ "reason": reason })),
            )
            .await;
    }

    /// Re-hash a password stored under outdated cost parameters
    ///
    /// Best effort: the login already succeeded.
    async fn upgrade_hash(&self, account: &Account, password: &ClearTextPassword) {
        if !self.ctx.credentials.needs_rehash(&account.password_hash) {
            return;
        }

        let rehashed = match self.ctx.credentials.hash(password) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(username = %account.username, error = %e, "Password rehash failed");
                return;
            }
        };

        let updated = within(
            self.ctx.config.store_timeout,
            "update_password",
            self.ctx
                .repo
                .update_password(&account.username, &rehashed, self.ctx.now()),
        )
        .await;

        match updated {
            Ok(()) => tracing::info!(username = %account.username, "Password hash upgraded"),
            Err(e) => {
                tracing::warn!(username = %account.username, error = %e, "Password rehash not stored")
            }
        }
    }
}
