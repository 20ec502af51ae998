//! Sign Up Use Case
//!
//! Creates a new account.

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;

use crate::application::context::AuthContext;
use crate::application::deadline::within;
use crate::domain::entity::{account::Account, audit_event::AuditEventType};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::user_name::UserName;
use crate::error::{AuthError, AuthResult};

/// Sign up input
pub struct SignUpInput {
    pub username: String,
    pub password: String,
    /// Only set by trusted callers (admin bootstrap), never from HTTP
    pub is_admin: bool,
}

/// Sign up output
#[derive(Debug)]
pub struct SignUpOutput {
    /// Canonical user name, the identity key used in tokens and sessions
    pub username: String,
}

/// Sign up use case
pub struct SignUpUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> SignUpUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, input: SignUpInput, client: &ClientInfo) -> AuthResult<SignUpOutput> {
        let username =
            UserName::new(&input.username).map_err(|e| AuthError::Validation(e.to_string()))?;

        self.ctx.credentials.validate_policy(&input.password)?;
        let password_hash = self
            .ctx
            .credentials
            .hash(&ClearTextPassword::new(input.password))?;

        let account = Account::new(username, password_hash, input.is_admin, self.ctx.now());

        // Uniqueness is enforced by the store, so concurrent duplicates
        // cannot both succeed.
        within(
            self.ctx.config.store_timeout,
            "insert_account",
            self.ctx.repo.insert_account(&account),
        )
        .await?;

        let audit = self.ctx.audit();
        audit
            .record(
                audit
                    .event(AuditEventType::Registration, client.ip_string())
                    .with_username(account.username.canonical())
                    .with_metadata(serde_json::json!({ "isAdmin": account.is_admin })),
            )
            .await;

        tracing::info!(
            username = %account.username,
            is_admin = account.is_admin,
            "User signed up"
        );

        Ok(SignUpOutput {
            username: account.username.canonical().to_string(),
        })
    }
}
