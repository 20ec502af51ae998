//! Request Extractors
//!
//! `AuthenticatedUser` and `AdminUser` let content modules gate their own
//! handlers on the same access tokens. Behind the policy middleware the
//! identity is already verified and is read from request extensions.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{HeaderMap, header, request::Parts};
use platform::client::ClientInfo;

use crate::application::context::AuthContext;
use crate::domain::repository::AuthStore;
use crate::domain::value_object::identity::Identity;
use crate::error::{AuthError, TokenFailure};

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Caller with a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl<R: AuthStore> FromRequestParts<AuthContext<R>> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthContext<R>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Self(identity.clone()));
        }

        let token = bearer_token(&parts.headers)
            .ok_or(AuthError::InvalidAccessToken(TokenFailure::Missing))?;
        state.tokens().verify_access(token).map(Self)
    }
}

/// Caller with a valid access token and the admin flag
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl<R: AuthStore> FromRequestParts<AuthContext<R>> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthContext<R>,
    ) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(identity) =
            AuthenticatedUser::from_request_parts(parts, state).await?;
        if !identity.is_admin {
            return Err(AuthError::AdminRequired);
        }
        Ok(Self(identity))
    }
}

/// Client IP and User-Agent of the request
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

impl RequestClient {
    /// The policy layer's view of the client, else the peer address alone
    pub fn from_parts(parts: &Parts) -> ClientInfo {
        if let Some(client) = parts.extensions.get::<ClientInfo>() {
            return client.clone();
        }
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        ClientInfo::from_headers(&parts.headers, direct_ip, 0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestClient {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Self::from_parts(parts)))
    }
}
