//! Auth Router
//!
//! Every route is declared once in [`Endpoint`] with its method, path,
//! authentication level and rate-limit action. The router is built from
//! that table, so a route cannot be added without a policy.

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{MethodRouter, get, post},
};

use crate::application::context::AuthContext;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::rate_limit_action::RateLimitAction;
use crate::presentation::handlers;
use crate::presentation::middleware::{PolicyState, enforce_policy, short_circuit_options};

/// Credential a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    Public,
    /// Valid access token
    Bearer,
    /// Valid access token with the admin flag
    Admin,
}

/// Route table of the security core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Register,
    Login,
    Refresh,
    Logout,
    ForgotPassword,
    Sessions,
    ChangePassword,
    AuditEvents,
}

impl Endpoint {
    pub const ALL: [Endpoint; 8] = [
        Self::Register,
        Self::Login,
        Self::Refresh,
        Self::Logout,
        Self::ForgotPassword,
        Self::Sessions,
        Self::ChangePassword,
        Self::AuditEvents,
    ];

    pub fn method(self) -> Method {
        match self {
            Self::Sessions | Self::AuditEvents => Method::GET,
            _ => Method::POST,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Register => "/auth/register",
            Self::Login => "/auth/login",
            Self::Refresh => "/auth/refresh",
            Self::Logout => "/auth/logout",
            Self::ForgotPassword => "/auth/forgot-password",
            Self::Sessions => "/security/sessions",
            Self::ChangePassword => "/security/change-password",
            Self::AuditEvents => "/security/audit-events",
        }
    }

    pub fn auth_level(self) -> AuthLevel {
        match self {
            Self::Register | Self::Login | Self::Refresh | Self::ForgotPassword => {
                AuthLevel::Public
            }
            Self::Logout | Self::Sessions | Self::ChangePassword => AuthLevel::Bearer,
            Self::AuditEvents => AuthLevel::Admin,
        }
    }

    pub fn rate_limit_action(self) -> RateLimitAction {
        match self {
            Self::Login => RateLimitAction::Login,
            Self::Register => RateLimitAction::Registration,
            Self::ForgotPassword => RateLimitAction::PasswordReset,
            _ => RateLimitAction::Api,
        }
    }

    fn handler<R: AuthStore>(self) -> MethodRouter<AuthContext<R>> {
        match self {
            Self::Register => post(handlers::register::<R>),
            Self::Login => post(handlers::login::<R>),
            Self::Refresh => post(handlers::refresh::<R>),
            Self::Logout => post(handlers::logout::<R>),
            Self::ForgotPassword => post(handlers::forgot_password::<R>),
            Self::Sessions => get(handlers::list_sessions::<R>),
            Self::ChangePassword => post(handlers::change_password::<R>),
            Self::AuditEvents => get(handlers::audit_events::<R>),
        }
    }
}

/// Create the auth router for any store implementation
pub fn auth_router<R: AuthStore>(ctx: AuthContext<R>) -> Router {
    let mut router = Router::new();
    for endpoint in Endpoint::ALL {
        let policy = PolicyState {
            ctx: ctx.clone(),
            endpoint,
        };
        router = router.route(
            endpoint.path(),
            endpoint
                .handler::<R>()
                .route_layer(middleware::from_fn_with_state(policy, enforce_policy::<R>)),
        );
    }

    router
        .layer(middleware::from_fn(short_circuit_options))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_route_table_is_unique() {
        let paths: HashSet<_> = Endpoint::ALL.iter().map(|e| e.path()).collect();
        assert_eq!(paths.len(), Endpoint::ALL.len());
    }

    #[test]
    fn test_policies() {
        assert_eq!(Endpoint::Login.rate_limit_action(), RateLimitAction::Login);
        assert_eq!(Endpoint::Register.auth_level(), AuthLevel::Public);
        assert_eq!(Endpoint::ChangePassword.auth_level(), AuthLevel::Bearer);
        assert_eq!(Endpoint::AuditEvents.auth_level(), AuthLevel::Admin);
        assert_eq!(Endpoint::Sessions.method(), Method::GET);
        assert_eq!(
            Endpoint::Refresh.rate_limit_action(),
            RateLimitAction::Api
        );
    }
}
