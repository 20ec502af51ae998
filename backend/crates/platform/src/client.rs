//! Client identification utilities
//!
//! Common functions for identifying clients via HTTP headers.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Longest User-Agent kept for session records
const MAX_USER_AGENT_LEN: usize = 512;

/// Placeholder used when no client IP can be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client details captured per request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client IP address (direct connection, or X-Forwarded-For behind
    /// trusted proxies)
    pub ip: Option<IpAddr>,
    /// User-Agent header, truncated
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Build from request headers and the direct peer address
    ///
    /// `trusted_proxy_hops` is how many reverse proxies in front of the
    /// server append to X-Forwarded-For; 0 ignores the header.
    pub fn from_headers(
        headers: &HeaderMap,
        direct_ip: Option<IpAddr>,
        trusted_proxy_hops: usize,
    ) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect());

        Self {
            ip: extract_client_ip(headers, direct_ip, trusted_proxy_hops),
            user_agent,
        }
    }

    /// IP as string, `"unknown"` when absent (rate-limit and audit key)
    pub fn ip_string(&self) -> String {
        self.ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Extract client IP address from headers
///
/// X-Forwarded-For is client controlled except for the entries appended by
/// our own proxies. With `trusted_proxy_hops` proxies, the entry that many
/// places from the right is the address the outermost proxy saw; anything
/// left of it may be forged. With no trusted proxies the header is ignored.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `direct_ip` - Direct connection IP address
/// * `trusted_proxy_hops` - Reverse proxies that append to X-Forwarded-For
///
/// ## Returns
/// The client IP address, or None if not determinable
pub fn extract_client_ip(
    headers: &HeaderMap,
    direct_ip: Option<IpAddr>,
    trusted_proxy_hops: usize,
) -> Option<IpAddr> {
    if trusted_proxy_hops == 0 {
        return direct_ip;
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| {
            let entries: Vec<&str> = xff.split(',').map(str::trim).collect();
            let index = entries.len().checked_sub(trusted_proxy_hops)?;
            entries[index].parse::<IpAddr>().ok()
        });

    forwarded.or(direct_ip)
}
