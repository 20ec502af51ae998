//! Verified caller identity

use kernel::id::{LineageId, SessionId};

/// Identity carried by a valid access token
///
/// This is what content and chat modules receive from `verify_access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Canonical user name
    pub username: String,
    pub is_admin: bool,
    /// Session record the token was minted for
    pub session_id: SessionId,
    /// Login lineage the session belongs to
    pub lineage_id: LineageId,
}
