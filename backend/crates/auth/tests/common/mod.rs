#![allow(dead_code)]

pub mod store;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use auth::application::{SignUpInput, SignUpUseCase};
use auth::config::SigningSecret;
use auth::domain::entity::audit_event::{AuditEvent, AuditEventType};
use auth::domain::repository::{AuditRepository, AuthStore};
use auth::{AuthConfig, AuthContext, MemoryAuthRepository, auth_router};
use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use platform::client::ClientInfo;
use platform::clock::ManualClock;
use platform::password::HashingCost;
use tower::ServiceExt;

pub const PASSWORD: &str = "Str0ng!Passw0rd";

/// Test configuration: fixed secret, cheap Argon2 parameters
///
/// Requests carry their client address in X-Forwarded-For as if behind one
/// proxy.
pub fn test_config() -> AuthConfig {
    let mut config = AuthConfig::new(SigningSecret::new(vec![0x5a; 32]).unwrap());
    config.password_hashing = HashingCost::testing();
    config.trusted_proxy_hops = 1;
    config
}

/// Router plus handles on its store and clock
pub struct TestApp<R = MemoryAuthRepository> {
    pub router: Router,
    pub ctx: AuthContext<R>,
    pub clock: Arc<ManualClock>,
    next_ip: AtomicU32,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        Self::with_store(MemoryAuthRepository::new(), config)
    }
}

impl<R: AuthStore> TestApp<R> {
    pub fn with_store(repo: R, config: AuthConfig) -> Self {
        let clock = Arc::new(ManualClock::starting_now());
        let ctx = AuthContext::new(repo, config, clock.clone()).unwrap();
        Self {
            router: auth_router(ctx.clone()),
            ctx,
            clock,
            next_ip: AtomicU32::new(1),
        }
    }

    /// A client address no other request in this test has used
    pub fn fresh_ip(&self) -> String {
        let n = self.next_ip.fetch_add(1, Ordering::Relaxed);
        format!("10.{}.{}.{}", (n >> 16) & 0xff, (n >> 8) & 0xff, n & 0xff)
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
        token: Option<&str>,
        ip: &str,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn post(&self, uri: &str, body: serde_json::Value, ip: &str) -> Response<Body> {
        self.send(Method::POST, uri, Some(body), None, ip).await
    }

    pub async fn post_auth(
        &self,
        uri: &str,
        body: serde_json::Value,
        token: &str,
        ip: &str,
    ) -> Response<Body> {
        self.send(Method::POST, uri, Some(body), Some(token), ip).await
    }

    pub async fn get_auth(&self, uri: &str, token: &str, ip: &str) -> Response<Body> {
        self.send(Method::GET, uri, None, Some(token), ip).await
    }

    /// Register through the API from a fresh address
    pub async fn register(&self, username: &str, password: &str) -> Response<Body> {
        let ip = self.fresh_ip();
        self.post(
            "/auth/register",
            serde_json::json!({ "username": username, "password": password }),
            &ip,
        )
        .await
    }

    /// Log in from a fresh address
    pub async fn login(&self, username: &str, password: &str) -> Response<Body> {
        let ip = self.fresh_ip();
        self.post(
            "/auth/login",
            serde_json::json!({ "username": username, "password": password }),
            &ip,
        )
        .await
    }

    /// Log in and return the token body, asserting success
    pub async fn login_ok(&self, username: &str) -> serde_json::Value {
        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status(), 200);
        body_json(response).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Response<Body> {
        let ip = self.fresh_ip();
        self.post(
            "/auth/refresh",
            serde_json::json!({ "refreshToken": refresh_token }),
            &ip,
        )
        .await
    }

    /// Create an account directly, bypassing HTTP limits
    pub async fn create_account(&self, username: &str, is_admin: bool) {
        SignUpUseCase::new(self.ctx.clone())
            .execute(
                SignUpInput {
                    username: username.to_string(),
                    password: PASSWORD.to_string(),
                    is_admin,
                },
                &ClientInfo::default(),
            )
            .await
            .unwrap();
    }

    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.ctx.repo.list_audit_events(500).await.unwrap()
    }

    pub async fn audit_count(&self, event_type: AuditEventType) -> usize {
        self.audit_events()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn str_field<'a>(json: &'a serde_json::Value, field: &str) -> &'a str {
    json[field].as_str().unwrap()
}
