//! Account Entity
//!
//! Credentials for one user name. Failed-login tracking is kept apart in
//! `login_failures`, keyed by name whether or not the account exists.

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;

use crate::domain::value_object::user_name::UserName;

/// Account entity
#[derive(Debug, Clone)]
pub struct Account {
    pub username: UserName,
    pub password_hash: HashedPassword,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        username: UserName,
        password_hash: HashedPassword,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username,
            password_hash,
            is_admin,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_password(&mut self, password_hash: HashedPassword, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use platform::password::{ClearTextPassword, HashingCost};

    fn hash(password: &str) -> HashedPassword {
        ClearTextPassword::new(password.to_string())
            .hash(&HashingCost::testing(), None)
            .unwrap()
    }

    #[test]
    fn test_update_password_touches_timestamp() {
        let t0 = Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap();
        let name = UserName::new("alice").unwrap();
        let mut acct = Account::new(name, hash("Str0ng!Passw0rd"), false, t0);
        assert_eq!(acct.created_at, acct.updated_at);

        let later = t0 + chrono::Duration::hours(1);
        let replacement = hash("An0ther!Passw0rd");
        acct.update_password(replacement.clone(), later);
        assert_eq!(acct.password_hash, replacement);
        assert_eq!(acct.updated_at, later);
        assert_eq!(acct.created_at, t0);
    }
}
