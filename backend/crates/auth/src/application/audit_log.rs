//! Audit Log Use Case (admin)

use crate::application::audit::MAX_AUDIT_PAGE;
use crate::application::context::AuthContext;
use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;

/// Page size when the caller gives none
pub const DEFAULT_AUDIT_PAGE: u32 = 50;

pub struct ListAuditEventsUseCase<R> {
    ctx: AuthContext<R>,
}

impl<R: AuthStore> ListAuditEventsUseCase<R> {
    pub fn new(ctx: AuthContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn execute(&self, limit: Option<u32>) -> AuthResult<Vec<AuditEvent>> {
        let limit = limit.unwrap_or(DEFAULT_AUDIT_PAGE).clamp(1, MAX_AUDIT_PAGE);
        self.ctx.audit().recent(limit).await
    }
}
