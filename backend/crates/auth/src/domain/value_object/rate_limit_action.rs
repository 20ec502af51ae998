//! Rate-limited action keys

use derive_more::Display;

/// Action a request is counted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RateLimitAction {
    #[display("login")]
    Login,
    #[display("registration")]
    Registration,
    #[display("password_reset")]
    PasswordReset,
    #[display("api")]
    Api,
}

impl RateLimitAction {
    /// Counter key for a client and this action
    pub fn key(self, client_ip: &str) -> String {
        format!("{self}:{client_ip}")
    }
}
