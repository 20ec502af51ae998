//! Environment Configuration
//!
//! Reads the process environment (after `.env`) once at startup. A missing
//! or short signing secret stops the server: a secret generated per process
//! would invalidate every outstanding session on each restart.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};
use auth::AuthConfig;
use auth::config::SigningSecret;
use axum::http::HeaderValue;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:40922,http://127.0.0.1:40922";

/// Which store backs the security core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Postgres { database_url: String },
    /// Single-process store for local development
    ///
    /// Counters are swept as they are touched, but audit events stay in
    /// memory until the next maintenance pass, which only runs at startup.
    Memory,
}

/// Credentials of an admin account created at startup if absent
#[derive(Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreKind,
    pub frontend_origins: Vec<HeaderValue>,
    pub auth: AuthConfig,
    pub admin: Option<AdminBootstrap>,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = var("AUTH_SIGNING_SECRET")
            .context("AUTH_SIGNING_SECRET must be set (base64, at least 32 bytes)")?;
        let signing_secret =
            SigningSecret::from_base64(&secret).context("AUTH_SIGNING_SECRET is unusable")?;

        let mut auth = AuthConfig::new(signing_secret);
        auth.password_pepper = var("AUTH_PASSWORD_PEPPER").map(String::into_bytes);
        if let Some(flag) = var("AUTH_AUDIT_REQUESTS") {
            auth.audit_requests = parse_bool(&flag)
                .with_context(|| format!("AUTH_AUDIT_REQUESTS: invalid value {flag:?}"))?;
        }
        if let Some(ms) = var("AUTH_STORE_TIMEOUT_MS") {
            let ms: u64 = ms.parse().context("AUTH_STORE_TIMEOUT_MS must be an integer")?;
            auth.store_timeout = Duration::from_millis(ms);
        }

        if let Some(hops) = var("AUTH_TRUSTED_PROXY_HOPS") {
            auth.trusted_proxy_hops = hops
                .trim()
                .parse()
                .context("AUTH_TRUSTED_PROXY_HOPS must be a non-negative integer")?;
        }

        let store = match var("AUTH_STORE").as_deref().unwrap_or("postgres") {
            "postgres" => StoreKind::Postgres {
                database_url: var("DATABASE_URL")
                    .context("DATABASE_URL must be set when AUTH_STORE=postgres")?,
            },
            "memory" => StoreKind::Memory,
            other => bail!("AUTH_STORE must be `postgres` or `memory`, got {other:?}"),
        };

        let bind_addr = var("BIND_ADDR")
            .as_deref()
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let frontend_origins = var("FRONTEND_ORIGINS")
            .as_deref()
            .unwrap_or(DEFAULT_FRONTEND_ORIGINS)
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        let admin = match (var("AUTH_ADMIN_USERNAME"), var("AUTH_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminBootstrap { username, password }),
            (None, None) => None,
            _ => bail!("AUTH_ADMIN_USERNAME and AUTH_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            bind_addr,
            store,
            frontend_origins,
            auth,
            admin,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY="; // 32 bytes

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let err = ApiConfig::from_lookup(lookup(&[("AUTH_STORE", "memory")])).unwrap_err();
        assert!(err.to_string().contains("AUTH_SIGNING_SECRET"));
    }

    #[test]
    fn test_short_secret_is_fatal() {
        let short = "c2hvcnQ="; // "short"
        assert!(
            ApiConfig::from_lookup(lookup(&[
                ("AUTH_SIGNING_SECRET", short),
                ("AUTH_STORE", "memory"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_memory_store_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("AUTH_SIGNING_SECRET", SECRET),
            ("AUTH_STORE", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.bind_addr.port(), 31113);
        assert_eq!(config.frontend_origins.len(), 2);
        assert!(config.admin.is_none());
        assert!(!config.auth.audit_requests);
        assert_eq!(config.auth.trusted_proxy_hops, 0);
    }

    #[test]
    fn test_trusted_proxy_hops() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("AUTH_SIGNING_SECRET", SECRET),
            ("AUTH_STORE", "memory"),
            ("AUTH_TRUSTED_PROXY_HOPS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.auth.trusted_proxy_hops, 1);

        assert!(
            ApiConfig::from_lookup(lookup(&[
                ("AUTH_SIGNING_SECRET", SECRET),
                ("AUTH_STORE", "memory"),
                ("AUTH_TRUSTED_PROXY_HOPS", "-1"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(ApiConfig::from_lookup(lookup(&[("AUTH_SIGNING_SECRET", SECRET)])).is_err());

        let config = ApiConfig::from_lookup(lookup(&[
            ("AUTH_SIGNING_SECRET", SECRET),
            ("DATABASE_URL", "postgres://localhost/app"),
            ("AUTH_AUDIT_REQUESTS", "true"),
        ]))
        .unwrap();
        assert!(matches!(config.store, StoreKind::Postgres { .. }));
        assert!(config.auth.audit_requests);
    }

    #[test]
    fn test_admin_bootstrap_needs_both_values() {
        assert!(
            ApiConfig::from_lookup(lookup(&[
                ("AUTH_SIGNING_SECRET", SECRET),
                ("AUTH_STORE", "memory"),
                ("AUTH_ADMIN_USERNAME", "root-admin"),
            ]))
            .is_err()
        );
    }
}
