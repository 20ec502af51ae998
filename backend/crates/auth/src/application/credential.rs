//! Credential Verifier
//!
//! Hashes and verifies passwords and enforces the composition policy.

use platform::crypto::random_token;
use platform::password::{ClearTextPassword, HashedPassword, HashingCost, PasswordPolicy};

use crate::application::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

/// Password hashing and verification with a fixed deployment cost
pub struct CredentialVerifier {
    policy: PasswordPolicy,
    cost: HashingCost,
    pepper: Option<Vec<u8>>,
    /// Verified against when the account does not exist, so the unknown
    /// user path costs the same as a wrong password
    dummy_hash: HashedPassword,
    /// Stands in for passwords over the length ceiling, which never reach
    /// Argon2
    placeholder: ClearTextPassword,
}

impl CredentialVerifier {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let cost = config.password_hashing;
        let dummy_hash =
            ClearTextPassword::new(random_token(24)).hash(&cost, config.pepper())?;
        Ok(Self {
            policy: config.password_policy.clone(),
            cost,
            pepper: config.password_pepper.clone(),
            dummy_hash,
            placeholder: ClearTextPassword::new(random_token(24)),
        })
    }

    /// Check the composition policy, reporting every violated rule
    pub fn validate_policy(&self, raw: &str) -> AuthResult<()> {
        self.policy.validate(raw).map_err(AuthError::from)
    }

    /// Salted Argon2id hash at the configured cost
    pub fn hash(&self, password: &ClearTextPassword) -> AuthResult<HashedPassword> {
        Ok(password.hash(&self.cost, self.pepper.as_deref())?)
    }

    /// Verify a password against a stored hash
    ///
    /// With no stored hash the dummy hash is verified and `false` returned,
    /// so both failure paths do the same work. A password longer than the
    /// policy allows is never hashed: a placeholder is verified against the
    /// dummy hash instead and the result is `false`.
    pub fn verify(&self, password: &ClearTextPassword, stored: Option<&HashedPassword>) -> bool {
        if password.char_count() > self.policy.max_length {
            let _ = self.dummy_hash.verify(&self.placeholder, self.pepper.as_deref());
            return false;
        }
        match stored {
            Some(hash) => hash.verify(password, self.pepper.as_deref()),
            None => {
                let _ = self.dummy_hash.verify(password, self.pepper.as_deref());
                false
            }
        }
    }

    /// Whether a stored hash predates the current cost parameters
    pub fn needs_rehash(&self, stored: &HashedPassword) -> bool {
        stored.needs_rehash(&self.cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::SigningSecret;
    use platform::password::PasswordRule;

    fn verifier() -> CredentialVerifier {
        let mut config = AuthConfig::new(SigningSecret::new(vec![1u8; 32]).unwrap());
        config.password_hashing = HashingCost::testing();
        config.password_pepper = Some(b"pepper".to_vec());
        CredentialVerifier::new(&config).unwrap()
    }

    fn pw(s: &str) -> ClearTextPassword {
        ClearTextPassword::new(s.to_string())
    }

    #[test]
    fn test_policy_examples() {
        let v = verifier();
        match v.validate_policy("abc123") {
            Err(AuthError::PasswordPolicy(rules)) => {
                assert!(rules.contains(&PasswordRule::TooShort { min: 8 }));
                assert!(rules.contains(&PasswordRule::MissingUppercase));
                assert!(rules.contains(&PasswordRule::MissingSpecial));
            }
            other => panic!("expected policy violation, got {other:?}"),
        }
        assert!(v.validate_policy("Str0ng!Passw0rd").is_ok());
    }

    #[test]
    fn test_hash_and_verify_with_pepper() {
        let v = verifier();
        let hash = v.hash(&pw("Str0ng!Passw0rd")).unwrap();
        assert!(v.verify(&pw("Str0ng!Passw0rd"), Some(&hash)));
        assert!(!v.verify(&pw("Wr0ng!Passw0rd"), Some(&hash)));
        assert!(!v.needs_rehash(&hash));
    }

    #[test]
    fn test_over_length_password_never_verifies() {
        let mut config = AuthConfig::new(SigningSecret::new(vec![1u8; 32]).unwrap());
        config.password_hashing = HashingCost::testing();
        let v = CredentialVerifier::new(&config).unwrap();

        // A hash made outside the policy, e.g. imported from elsewhere
        let long = format!("Aa1!{}", "x".repeat(200));
        let hash = pw(&long).hash(&HashingCost::testing(), None).unwrap();
        assert!(pw(&long).char_count() > config.password_policy.max_length);
        assert!(!v.verify(&pw(&long), Some(&hash)));

        let at_limit = format!("Aa1!{}", "x".repeat(config.password_policy.max_length - 4));
        let hash = v.hash(&pw(&at_limit)).unwrap();
        assert!(v.verify(&pw(&at_limit), Some(&hash)));
    }

    #[test]
    fn test_unknown_account_never_verifies() {
        let v = verifier();
        assert!(!v.verify(&pw("Str0ng!Passw0rd"), None));
    }
}
