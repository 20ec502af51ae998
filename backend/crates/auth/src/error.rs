//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use derive_more::Display;
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::{PasswordRule, PolicyViolations};
use thiserror::Error;
use uuid::Uuid;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Why an access token was rejected (logged, never shown to the client)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TokenFailure {
    #[display("missing")]
    Missing,
    #[display("malformed")]
    Malformed,
    #[display("bad_signature")]
    BadSignature,
    #[display("expired")]
    Expired,
}

/// Correlation id of a 5xx response, stored in response extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// New password breaks one or more composition rules
    #[error("{}", PolicyViolations(.0.clone()))]
    PasswordPolicy(Vec<PasswordRule>),

    /// Unknown user name or wrong password (indistinguishable)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Access token failed verification
    #[error("Invalid access token ({0})")]
    InvalidAccessToken(TokenFailure),

    /// Refresh token not found, expired, or past its rotation interval
    #[error("Session not found or expired")]
    SessionInvalid,

    /// A revoked refresh token was presented again
    #[error("Refresh token reuse detected")]
    RefreshTokenReuse,

    /// Account is locked (too many failed attempts)
    #[error("Account is temporarily locked")]
    AccountLocked { retry_after: u64 },

    /// Valid identity without admin privileges
    #[error("Admin privileges required")]
    AdminRequired,

    /// Rate limit exceeded
    #[error("Too many requests")]
    RateLimited { retry_after: u64 },

    /// User name already exists
    #[error("User name already exists")]
    UserNameTaken,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A store call exceeded its deadline
    #[error("Store call timed out: {0}")]
    StoreTimeout(&'static str),

    /// Store returned data that could not be interpreted
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.kind().status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) | AuthError::PasswordPolicy(_) => ErrorKind::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::InvalidAccessToken(_)
            | AuthError::SessionInvalid
            | AuthError::RefreshTokenReuse => ErrorKind::Unauthorized,
            AuthError::AccountLocked { .. } => ErrorKind::Locked,
            AuthError::AdminRequired => ErrorKind::Forbidden,
            AuthError::RateLimited { .. } => ErrorKind::TooManyRequests,
            AuthError::UserNameTaken => ErrorKind::Conflict,
            AuthError::Database(_)
            | AuthError::StoreTimeout(_)
            | AuthError::Store(_)
            | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to the client-facing AppError
    ///
    /// Token and session failures collapse to one message so the client
    /// cannot tell which check failed.
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::Validation(msg) => AppError::bad_request(msg.clone()),
            AuthError::PasswordPolicy(_) => AppError::bad_request(self.to_string()),
            AuthError::InvalidCredentials => AppError::unauthorized("Invalid credentials"),
            AuthError::InvalidAccessToken(_) => {
                AppError::unauthorized("Invalid or expired access token")
            }
            AuthError::SessionInvalid | AuthError::RefreshTokenReuse => {
                AppError::unauthorized("Invalid or expired session")
            }
            AuthError::AccountLocked { retry_after } => {
                AppError::locked("Account is temporarily locked").with_retry_after(*retry_after)
            }
            AuthError::AdminRequired => AppError::forbidden("Admin privileges required"),
            AuthError::RateLimited { retry_after } => {
                AppError::too_many_requests("Too many requests").with_retry_after(*retry_after)
            }
            AuthError::UserNameTaken => AppError::conflict("User name already exists"),
            AuthError::Database(_)
            | AuthError::StoreTimeout(_)
            | AuthError::Store(_)
            | AuthError::Internal(_) => AppError::internal("Internal server error"),
        }
    }

    /// Log the error with appropriate level
    fn log(&self, correlation_id: Option<&str>) {
        match self {
            AuthError::Database(_)
            | AuthError::StoreTimeout(_)
            | AuthError::Store(_)
            | AuthError::Internal(_) => {
                tracing::error!(
                    correlation_id = correlation_id.unwrap_or_default(),
                    error = %self,
                    "Auth internal failure"
                );
            }
            AuthError::InvalidAccessToken(reason) => {
                tracing::warn!(reason = %reason, "Access token rejected");
            }
            AuthError::RefreshTokenReuse => {
                tracing::warn!("Refresh token reuse rejected");
            }
            AuthError::InvalidCredentials
            | AuthError::AccountLocked { .. }
            | AuthError::AdminRequired
            | AuthError::RateLimited { .. } => {
                tracing::warn!(error = %self, "Request denied");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if !self.kind().is_server_error() {
            self.log(None);
            return self.to_app_error().into_response();
        }

        let correlation_id = Uuid::new_v4().to_string();
        self.log(Some(&correlation_id));

        let app_error = match self {
            // Keep the status the kernel assigns to database failures (e.g. 503
            // for pool exhaustion) but never its message.
            AuthError::Database(e) => AppError::from(e).with_message("Internal server error"),
            other => other.to_app_error(),
        };

        let mut response = app_error
            .with_correlation_id(correlation_id.clone())
            .into_response();
        response
            .extensions_mut()
            .insert(CorrelationId(correlation_id));
        response
    }
}

impl From<PolicyViolations> for AuthError {
    fn from(err: PolicyViolations) -> Self {
        AuthError::PasswordPolicy(err.0)
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AuthError {
    fn from(rejection: QueryRejection) -> Self {
        AuthError::Validation(rejection.body_text())
    }
}
