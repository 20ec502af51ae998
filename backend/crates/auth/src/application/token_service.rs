//! Token Service
//!
//! Access tokens are HS256-signed JWTs carrying the user name and admin
//! flag. Refresh tokens are opaque random strings; only their SHA-256 hash
//! is stored, so a store leak does not expose live sessions.
//!
//! Each refresh rotates: the presented session is revoked with a
//! compare-and-set and a successor in the same lineage is created. A
//! revoked token presented again means the lineage may be compromised, and
//! the whole lineage is revoked.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::id::{LineageId, SessionId};
use platform::client::ClientInfo;
use platform::clock::Clock;
use platform::crypto::{random_token, sha256_hex};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::{AuthConfig, to_chrono};
use crate::application::deadline::within;
use crate::application::session_registry::SessionRegistry;
use crate::domain::entity::{account::Account, session::Session};
use crate::domain::repository::{AccountRepository, SessionRepository};
use crate::domain::value_object::{identity::Identity, user_name::UserName};
use crate::error::{AuthError, AuthResult, TokenFailure};

/// Refresh token entropy in bytes
const REFRESH_TOKEN_BYTES: usize = 32;

/// JWT claims embedded in every access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Canonical user name
    pub sub: String,
    /// Admin flag
    pub adm: bool,
    /// Session id
    pub sid: Uuid,
    /// Lineage id
    pub lin: Uuid,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    /// Unique token id
    pub jti: String,
}

/// Access/refresh token pair returned to the client
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Result of a successful login
#[derive(Debug)]
pub struct IssuedSession {
    pub tokens: TokenPair,
    pub session: Session,
    /// Sessions evicted to stay within the concurrency limit
    pub evicted: Vec<Session>,
}

/// Result of presenting a refresh token that exists in the store
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Token rotated; `session` is the successor
    Rotated {
        tokens: TokenPair,
        session: Session,
        evicted: Vec<Session>,
    },
    /// A revoked token was replayed; the lineage has been revoked
    Reused { session: Session, revoked: u64 },
}

pub struct TokenService<R> {
    repo: Arc<R>,
    registry: SessionRegistry<R>,
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
}

impl<R> TokenService<R>
where
    R: SessionRepository + AccountRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<AuthConfig>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: SessionRegistry::new(repo.clone(), config.clone(), clock.clone()),
            repo,
            config,
            clock,
        }
    }

    pub fn registry(&self) -> &SessionRegistry<R> {
        &self.registry
    }

    /// Start a new session lineage for an authenticated account
    pub async fn issue(
        &self,
        account: &Account,
        remember_me: bool,
        client: &ClientInfo,
    ) -> AuthResult<IssuedSession> {
        let refresh_token = random_token(REFRESH_TOKEN_BYTES);
        let session = Session::start(
            account.username.canonical(),
            sha256_hex(refresh_token.as_bytes()),
            self.config.refresh_ttl(remember_me),
            remember_me,
            client,
            self.clock.now(),
        );

        let evicted = self.registry.register(&session).await?;
        let access_token = self.mint_access(account.username.canonical(), account.is_admin, &session)?;

        tracing::info!(
            username = %account.username,
            session_id = %session.session_id,
            remember_me,
            "Session issued"
        );

        Ok(IssuedSession {
            tokens: TokenPair {
                access_token,
                refresh_token,
                expires_in: self.config.access_token_ttl.as_secs(),
            },
            session,
            evicted,
        })
    }

    /// Sign an access token bound to a session
    pub fn mint_access(&self, username: &str, is_admin: bool, session: &Session) -> AuthResult<String> {
        let now = self.clock.now();
        let exp = now + to_chrono(self.config.access_token_ttl);
        let claims = Claims {
            sub: username.to_string(),
            adm: is_admin,
            sid: session.session_id.into_uuid(),
            lin: session.lineage_id.into_uuid(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.signing_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Access token signing failed: {e}")))
    }

    /// Check signature and expiry of an access token
    ///
    /// Expiry is checked against the injected clock with no leeway.
    pub fn verify_access(&self, token: &str) -> AuthResult<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.signing_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            let failure = match e.kind() {
                ErrorKind::InvalidSignature => TokenFailure::BadSignature,
                ErrorKind::ExpiredSignature => TokenFailure::Expired,
                _ => TokenFailure::Malformed,
            };
            AuthError::InvalidAccessToken(failure)
        })?;

        let claims = data.claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(AuthError::InvalidAccessToken(TokenFailure::Expired));
        }

        Ok(Identity {
            username: claims.sub,
            is_admin: claims.adm,
            session_id: SessionId::from_uuid(claims.sid),
            lineage_id: LineageId::from_uuid(claims.lin),
        })
    }

    /// Exchange a refresh token for a new token pair
    ///
    /// Not found, expired, and past-rotation-interval tokens fail with
    /// `SessionInvalid`. A revoked token whose lineage still had live
    /// sessions yields `RefreshOutcome::Reused` after the lineage is revoked.
    pub async fn refresh(&self, refresh_token: &str, client: &ClientInfo) -> AuthResult<RefreshOutcome> {
        let now = self.clock.now();
        let hash = sha256_hex(refresh_token.as_bytes());

        let session = within(
            self.config.store_timeout,
            "find_session_by_refresh_hash",
            self.repo.find_session_by_refresh_hash(&hash),
        )
        .await?
        .ok_or(AuthError::SessionInvalid)?;

        if session.revoked {
            return self.reuse_detected(session).await;
        }

        if session.is_expired(now) {
            tracing::info!(session_id = %session.session_id, "Refresh with expired session");
            return Err(AuthError::SessionInvalid);
        }

        if self.registry.rotation_overdue(&session) {
            self.registry.revoke(session.session_id).await?;
            tracing::info!(
                session_id = %session.session_id,
                username = %session.username,
                "Session past rotation interval, re-authentication required"
            );
            return Err(AuthError::SessionInvalid);
        }

        let account = within(
            self.config.store_timeout,
            "find_account",
            self.repo.find_account(&UserName::from_db(&session.username)),
        )
        .await?;
        let Some(account) = account else {
            self.registry.revoke_lineage(session.lineage_id).await?;
            return Err(AuthError::SessionInvalid);
        };

        let new_refresh = random_token(REFRESH_TOKEN_BYTES);
        let successor = session.successor(
            sha256_hex(new_refresh.as_bytes()),
            self.config.refresh_ttl(session.remember_me),
            client,
            now,
        );

        // Revoke and insert in one store step; a racing lineage revocation
        // either sees the successor or makes this fail
        let Some(evicted) = self.registry.rotate(session.session_id, &successor).await? else {
            return self.reuse_detected(session).await;
        };
        let access_token =
            self.mint_access(account.username.canonical(), account.is_admin, &successor)?;

        tracing::info!(
            username = %successor.username,
            lineage_id = %successor.lineage_id,
            session_id = %successor.session_id,
            "Refresh token rotated"
        );

        Ok(RefreshOutcome::Rotated {
            tokens: TokenPair {
                access_token,
                refresh_token: new_refresh,
                expires_in: self.config.access_token_ttl.as_secs(),
            },
            session: successor,
            evicted,
        })
    }

    /// Revoke a single session (logout of one device)
    pub async fn revoke(&self, session_id: SessionId) -> AuthResult<bool> {
        self.registry.revoke(session_id).await
    }

    /// A revoked token was presented
    ///
    /// Reuse only when the lineage still had live sessions. A token from a
    /// lineage that is already fully revoked (logout, an earlier reuse) is
    /// just an invalid session.
    async fn reuse_detected(&self, session: Session) -> AuthResult<RefreshOutcome> {
        let revoked = self.registry.revoke_lineage(session.lineage_id).await?;
        if revoked == 0 {
            tracing::info!(
                session_id = %session.session_id,
                lineage_id = %session.lineage_id,
                "Refresh with token of a revoked lineage"
            );
            return Err(AuthError::SessionInvalid);
        }
        tracing::warn!(
            username = %session.username,
            lineage_id = %session.lineage_id,
            revoked,
            "Refresh token reuse detected, lineage revoked"
        );
        Ok(RefreshOutcome::Reused { session, revoked })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::SigningSecret;
    use crate::infra::memory::MemoryAuthRepository;
    use platform::clock::ManualClock;
    use platform::password::{ClearTextPassword, HashingCost};
    use std::time::Duration;

    struct Fixture {
        tokens: TokenService<MemoryAuthRepository>,
        clock: Arc<ManualClock>,
        account: Account,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(MemoryAuthRepository::new());
        let clock = Arc::new(ManualClock::starting_now());
        let config = Arc::new(AuthConfig::new(SigningSecret::new(vec![42u8; 32]).unwrap()));
        let hash = ClearTextPassword::new("Str0ng!Passw0rd".into())
            .hash(&HashingCost::testing(), None)
            .unwrap();
        let account = Account::new(UserName::new("erin").unwrap(), hash, true, clock.now());
        repo.insert_account(&account).await.unwrap();
        Fixture {
            tokens: TokenService::new(repo, config, clock.clone()),
            clock,
            account,
        }
    }

    fn rotated(outcome: RefreshOutcome) -> (TokenPair, Session) {
        match outcome {
            RefreshOutcome::Rotated { tokens, session, .. } => (tokens, session),
            RefreshOutcome::Reused { .. } => panic!("expected rotation"),
        }
    }

    #[tokio::test]
    async fn test_access_token_roundtrip_and_expiry() {
        let f = fixture().await;
        let issued = f.tokens.issue(&f.account, false, &ClientInfo::default()).await.unwrap();
        assert_eq!(issued.tokens.expires_in, 900);

        let identity = f.tokens.verify_access(&issued.tokens.access_token).unwrap();
        assert_eq!(identity.username, "erin");
        assert!(identity.is_admin);
        assert_eq!(identity.session_id, issued.session.session_id);
        assert_eq!(identity.lineage_id, issued.session.lineage_id);

        f.clock.advance(Duration::from_secs(15 * 60));
        assert!(matches!(
            f.tokens.verify_access(&issued.tokens.access_token),
            Err(AuthError::InvalidAccessToken(TokenFailure::Expired))
        ));
    }

    #[tokio::test]
    async fn test_signature_and_malformed_are_distinguished() {
        let f = fixture().await;
        let issued = f.tokens.issue(&f.account, false, &ClientInfo::default()).await.unwrap();

        let other = TokenService::new(
            Arc::new(MemoryAuthRepository::new()),
            Arc::new(AuthConfig::new(SigningSecret::new(vec![7u8; 32]).unwrap())),
            f.clock.clone(),
        );
        assert!(matches!(
            other.verify_access(&issued.tokens.access_token),
            Err(AuthError::InvalidAccessToken(TokenFailure::BadSignature))
        ));
        assert!(matches!(
            f.tokens.verify_access("not-a-jwt"),
            Err(AuthError::InvalidAccessToken(TokenFailure::Malformed))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_within_lineage() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let issued = f.tokens.issue(&f.account, false, &client).await.unwrap();

        f.clock.advance(Duration::from_secs(60));
        let (pair, successor) =
            rotated(f.tokens.refresh(&issued.tokens.refresh_token, &client).await.unwrap());
        assert_ne!(pair.refresh_token, issued.tokens.refresh_token);
        assert_eq!(successor.lineage_id, issued.session.lineage_id);
        assert_ne!(successor.session_id, issued.session.session_id);

        let identity = f.tokens.verify_access(&pair.access_token).unwrap();
        assert_eq!(identity.session_id, successor.session_id);
    }

    #[tokio::test]
    async fn test_replayed_token_revokes_lineage() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let issued = f.tokens.issue(&f.account, false, &client).await.unwrap();
        let (pair, _) =
            rotated(f.tokens.refresh(&issued.tokens.refresh_token, &client).await.unwrap());

        match f.tokens.refresh(&issued.tokens.refresh_token, &client).await.unwrap() {
            RefreshOutcome::Reused { revoked, .. } => assert_eq!(revoked, 1),
            RefreshOutcome::Rotated { .. } => panic!("replay must not rotate"),
        }

        // The legitimate successor is gone as well, and presenting it is not
        // a second reuse
        assert!(matches!(
            f.tokens.refresh(&pair.refresh_token, &client).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_unknown_and_expired_refresh_tokens() {
        let f = fixture().await;
        let client = ClientInfo::default();
        assert!(matches!(
            f.tokens.refresh("never-issued", &client).await,
            Err(AuthError::SessionInvalid)
        ));

        let issued = f.tokens.issue(&f.account, false, &client).await.unwrap();
        f.clock.advance(Duration::from_secs(7 * 24 * 3600 + 1));
        assert!(matches!(
            f.tokens.refresh(&issued.tokens.refresh_token, &client).await,
            Err(AuthError::SessionInvalid)
        ));
    }

    #[tokio::test]
    async fn test_rotation_interval_forces_reauthentication() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let issued = f.tokens.issue(&f.account, true, &client).await.unwrap();

        f.clock.advance(Duration::from_secs(24 * 3600 + 1));
        assert!(matches!(
            f.tokens.refresh(&issued.tokens.refresh_token, &client).await,
            Err(AuthError::SessionInvalid)
        ));
        assert!(
            f.tokens
                .registry()
                .list_active("erin")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
