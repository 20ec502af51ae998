//! Policy Middleware
//!
//! One gate in front of every auth route: rate limit, then access token,
//! then admin flag. Denials are audited before the response is returned.
//! The verified `Identity` and the `ClientInfo` are placed in request
//! extensions for the handler.

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::ClientInfo;
use std::net::SocketAddr;

use crate::application::context::AuthContext;
use crate::domain::entity::audit_event::AuditEventType;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, CorrelationId, TokenFailure};
use crate::presentation::extractor::bearer_token;
use crate::presentation::router::{AuthLevel, Endpoint};

/// Middleware state: shared context plus the route being guarded
pub struct PolicyState<R> {
    pub ctx: AuthContext<R>,
    pub endpoint: Endpoint,
}

impl<R> Clone for PolicyState<R> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            endpoint: self.endpoint,
        }
    }
}

/// Apply the route's rate limit and authentication level
pub async fn enforce_policy<R: AuthStore>(
    State(policy): State<PolicyState<R>>,
    mut req: Request,
    next: Next,
) -> Response {
    let PolicyState { ctx, endpoint } = policy;

    let direct_ip = req
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client =
        ClientInfo::from_headers(req.headers(), direct_ip, ctx.config.trusted_proxy_hops);
    let client_ip = client.ip_string();
    let path = req.uri().path().to_string();
    let audit = ctx.audit();

    let action = endpoint.rate_limit_action();
    let decision = ctx.rate_limiter().check(&client_ip, action).await;
    if !decision.allowed {
        audit
            .record(
                audit
                    .event(AuditEventType::RateLimited, &client_ip)
                    .with_path(&path)
                    .with_metadata(serde_json::json!({
                        "action": action.to_string(),
                        "retryAfter": decision.retry_after_secs,
                    })),
            )
            .await;
        return AuthError::RateLimited {
            retry_after: decision.retry_after_secs,
        }
        .into_response();
    }

    let identity = match endpoint.auth_level() {
        AuthLevel::Public => None,
        level => {
            let verified = bearer_token(req.headers())
                .ok_or(AuthError::InvalidAccessToken(TokenFailure::Missing))
                .and_then(|token| ctx.tokens().verify_access(token));

            let identity = match verified {
                Ok(identity) => identity,
                Err(e) => {
                    let reason = match &e {
                        AuthError::InvalidAccessToken(failure) => failure.to_string(),
                        other => other.to_string(),
                    };
                    audit
                        .record(
                            audit
                                .event(AuditEventType::AuthFailure, &client_ip)
                                .with_path(&path)
                                .with_metadata(serde_json::json!({ "reason": reason })),
                        )
                        .await;
                    return e.into_response();
                }
            };

            if level == AuthLevel::Admin && !identity.is_admin {
                audit
                    .record(
                        audit
                            .event(AuditEventType::UnauthorizedAdminAccess, &client_ip)
                            .with_username(identity.username.clone())
                            .with_path(&path),
                    )
                    .await;
                return AuthError::AdminRequired.into_response();
            }
            Some(identity)
        }
    };

    let username = identity.as_ref().map(|i| i.username.clone());
    if ctx.config.audit_requests {
        let mut event = audit
            .event(AuditEventType::Request, &client_ip)
            .with_path(&path)
            .with_metadata(serde_json::json!({ "method": req.method().as_str() }));
        if let Some(username) = &username {
            event = event.with_username(username.clone());
        }
        audit.record(event).await;
    }

    if let Some(identity) = identity {
        req.extensions_mut().insert(identity);
    }
    req.extensions_mut().insert(client);

    let response = next.run(req).await;

    if response.status().is_server_error() {
        let correlation_id = response
            .extensions()
            .get::<CorrelationId>()
            .map(|id| id.0.clone());
        let mut event = audit
            .event(AuditEventType::ApiError, &client_ip)
            .with_path(&path)
            .with_metadata(serde_json::json!({
                "status": response.status().as_u16(),
                "id": correlation_id,
            }));
        if let Some(username) = username {
            event = event.with_username(username);
        }
        audit.record(event).await;
    }

    response
}

/// Answer `OPTIONS` with 200 and an empty body
pub async fn short_circuit_options(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return ().into_response();
    }
    next.run(req).await
}
