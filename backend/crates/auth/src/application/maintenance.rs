//! Startup Maintenance
//!
//! One bounded pass run when the process starts: prune audit events past
//! retention, delete expired sessions, delete stale rate-limit and
//! failed-login counters. Each step is best effort.

use crate::application::config::to_chrono;
use crate::application::context::AuthContext;
use crate::application::deadline::within;
use crate::domain::repository::AuthStore;

/// Rows removed by one maintenance pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub audit_events: u64,
    pub sessions: u64,
    pub rate_limit_counters: u64,
    pub login_failures: u64,
}

pub async fn run_maintenance<R: AuthStore>(ctx: &AuthContext<R>) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();
    let now = ctx.now();
    let timeout = ctx.config.store_timeout;

    match ctx.audit().prune(ctx.config.audit_retention).await {
        Ok(n) => report.audit_events = n,
        Err(e) => tracing::warn!(error = %e, "Audit pruning failed"),
    }

    match within(timeout, "delete_expired_sessions", ctx.repo.delete_expired_sessions(now)).await {
        Ok(n) => report.sessions = n,
        Err(e) => tracing::warn!(error = %e, "Expired session cleanup failed"),
    }

    let stale_before = now - to_chrono(ctx.config.rate_limits.longest_window());
    match within(
        timeout,
        "delete_stale_rate_limits",
        ctx.repo.delete_stale_rate_limits(stale_before),
    )
    .await
    {
        Ok(n) => report.rate_limit_counters = n,
        Err(e) => tracing::warn!(error = %e, "Rate limit counter cleanup failed"),
    }

    // A counter untouched for one lockout duration has no lock left
    let quiet_since = now - to_chrono(ctx.config.lockout.lockout_duration);
    match within(
        timeout,
        "delete_stale_login_failures",
        ctx.repo.delete_stale_login_failures(quiet_since),
    )
    .await
    {
        Ok(n) => report.login_failures = n,
        Err(e) => tracing::warn!(error = %e, "Failed-login counter cleanup failed"),
    }

    tracing::info!(
        audit_events = report.audit_events,
        sessions = report.sessions,
        rate_limit_counters = report.rate_limit_counters,
        login_failures = report.login_failures,
        "Startup maintenance finished"
    );
    report
}
