//! HTTP Handlers
//!
//! Thin adapters: parse the body, call the use case, shape the response.
//! Rate limiting and token checks already happened in the policy
//! middleware.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};

use crate::application::{
    ChangePasswordInput, ChangePasswordUseCase, ForgotPasswordUseCase, ListAuditEventsUseCase,
    ListSessionsUseCase, RefreshUseCase, SignInInput, SignInUseCase, SignOutUseCase, SignUpInput,
    SignUpUseCase,
};
use crate::application::context::AuthContext;
use crate::domain::repository::AuthStore;
use crate::error::AuthResult;
use crate::presentation::dto::{
    AuditEventsQuery, AuditEventsResponse, ChangePasswordRequest, ChangePasswordResponse,
    ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, RefreshRequest, RegisterRequest,
    RegisterResponse, SessionView, SessionsResponse, SuccessResponse, TokenResponse,
};
use crate::presentation::extractor::{AdminUser, AuthenticatedUser, RequestClient};

// ============================================================================
// Register
// ============================================================================

/// POST /auth/register
pub async fn register<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    RequestClient(client): RequestClient,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<Json<RegisterResponse>> {
    let Json(req) = payload?;

    let output = SignUpUseCase::new(ctx)
        .execute(
            SignUpInput {
                username: req.username,
                password: req.password,
                is_admin: false,
            },
            &client,
        )
        .await?;

    Ok(Json(RegisterResponse {
        success: true,
        username: output.username,
    }))
}

// ============================================================================
// Login / Refresh / Logout
// ============================================================================

/// POST /auth/login
pub async fn login<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    RequestClient(client): RequestClient,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<TokenResponse>> {
    let Json(req) = payload?;

    let output = SignInUseCase::new(ctx)
        .execute(
            SignInInput {
                username: req.username,
                password: req.password,
                remember_me: req.remember_me,
            },
            &client,
        )
        .await?;

    Ok(Json(output.tokens.into()))
}

/// POST /auth/refresh
pub async fn refresh<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    RequestClient(client): RequestClient,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> AuthResult<Json<TokenResponse>> {
    let Json(req) = payload?;

    let tokens = RefreshUseCase::new(ctx)
        .execute(&req.refresh_token, &client)
        .await?;

    Ok(Json(tokens.into()))
}

/// POST /auth/logout
pub async fn logout<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    RequestClient(client): RequestClient,
) -> AuthResult<Json<SuccessResponse>> {
    SignOutUseCase::new(ctx).execute(&identity, &client).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================================
// Forgot Password
// ============================================================================

/// POST /auth/forgot-password
///
/// Always 200 with the same body, whatever the input.
pub async fn forgot_password<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    RequestClient(client): RequestClient,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> AuthResult<Json<ForgotPasswordResponse>> {
    let username = payload.map(|Json(req)| req.username).unwrap_or_default();

    let message = ForgotPasswordUseCase::new(ctx)
        .execute(&username, &client)
        .await?;

    Ok(Json(ForgotPasswordResponse {
        success: true,
        message,
    }))
}

// ============================================================================
// Security
// ============================================================================

/// GET /security/sessions
pub async fn list_sessions<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    AuthenticatedUser(identity): AuthenticatedUser,
) -> AuthResult<Json<SessionsResponse>> {
    let sessions = ListSessionsUseCase::new(ctx).execute(&identity).await?;

    Ok(Json(SessionsResponse {
        sessions: sessions
            .into_iter()
            .map(|s| {
                let current = s.lineage_id == identity.lineage_id;
                SessionView::new(s, current)
            })
            .collect(),
    }))
}

/// POST /security/change-password
pub async fn change_password<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    AuthenticatedUser(identity): AuthenticatedUser,
    RequestClient(client): RequestClient,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> AuthResult<Json<ChangePasswordResponse>> {
    let Json(req) = payload?;

    let output = ChangePasswordUseCase::new(ctx)
        .execute(
            &identity,
            ChangePasswordInput {
                current_password: req.current_password,
                new_password: req.new_password,
            },
            &client,
        )
        .await?;

    Ok(Json(ChangePasswordResponse {
        success: true,
        revoked_sessions: output.revoked_sessions,
    }))
}

/// GET /security/audit-events?limit=
pub async fn audit_events<R: AuthStore>(
    State(ctx): State<AuthContext<R>>,
    AdminUser(_admin): AdminUser,
    query: Result<Query<AuditEventsQuery>, QueryRejection>,
) -> AuthResult<Json<AuditEventsResponse>> {
    let Query(query) = query?;

    let events = ListAuditEventsUseCase::new(ctx).execute(query.limit).await?;

    Ok(Json(AuditEventsResponse {
        events: events.into_iter().map(Into::into).collect(),
    }))
}
