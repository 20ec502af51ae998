//! List Sessions Use Case

use crate::application::context::AuthContext;
use crate::domain::entity::session::Session;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::identity::Identity;
use crate::error::AuthResult;

/// Active sessions of the signed-in account, most recent first
pub struct ListSessionsUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> ListSessionsUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, identity: &Identity) -> AuthResult<Vec<Session>> {
        self.ctx.sessions().list_active(&identity.username).await
    }
}
