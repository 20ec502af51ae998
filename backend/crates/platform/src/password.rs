//! Password Hashing, Verification and Policy
//!
//! Password handling with:
//! - Argon2id hashing (memory-hard, salt embedded in the PHC output)
//! - Zeroization of sensitive data
//! - Constant-time verification
//! - A composition policy that reports every violated rule
//!
//! ## Security Features
//! - Memory-hard hashing prevents GPU/ASIC attacks
//! - Cost parameters are fixed per deployment ([`HashingCost`])
//! - Zeroization prevents memory inspection attacks
//! - Pepper support for additional security layer

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use serde::Serialize;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Constants
// ============================================================================

/// Default minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Default maximum password length (bounds hashing work per request)
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Policy
// ============================================================================

/// A single password composition rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum PasswordRule {
    /// Password is shorter than the minimum
    TooShort { min: usize },
    /// Password is longer than the ceiling
    TooLong { max: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
    /// Password contains control characters
    InvalidCharacter,
    /// Password matches common patterns (sequential, keyboard, dictionary)
    CommonPattern,
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min } => write!(f, "must be at least {min} characters"),
            Self::TooLong { max } => write!(f, "must be at most {max} characters"),
            Self::MissingUppercase => write!(f, "must contain an uppercase letter"),
            Self::MissingLowercase => write!(f, "must contain a lowercase letter"),
            Self::MissingDigit => write!(f, "must contain a digit"),
            Self::MissingSpecial => write!(f, "must contain a special character"),
            Self::InvalidCharacter => write!(f, "must not contain control characters"),
            Self::CommonPattern => write!(f, "is too common or follows a predictable pattern"),
        }
    }
}

/// Every rule a password failed, in evaluation order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Password {}", join_rules(.0))]
pub struct PolicyViolations(pub Vec<PasswordRule>);

impl PolicyViolations {
    pub fn rules(&self) -> &[PasswordRule] {
        &self.0
    }

    pub fn contains(&self, rule: &PasswordRule) -> bool {
        self.0.contains(rule)
    }
}

fn join_rules(rules: &[PasswordRule]) -> String {
    rules
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Password composition policy
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    pub reject_common_patterns: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            max_length: MAX_PASSWORD_LENGTH,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            reject_common_patterns: true,
        }
    }
}

impl PasswordPolicy {
    /// Check a password against every rule
    ///
    /// Length is counted in Unicode code points after NFKC normalization.
    /// All violations are collected rather than stopping at the first.
    pub fn validate(&self, raw: &str) -> Result<(), PolicyViolations> {
        let normalized: String = raw.nfkc().collect();
        let mut violations = Vec::new();

        let char_count = normalized.chars().count();
        if char_count < self.min_length {
            violations.push(PasswordRule::TooShort {
                min: self.min_length,
            });
        }
        if char_count > self.max_length {
            violations.push(PasswordRule::TooLong {
                max: self.max_length,
            });
        }

        if self.require_uppercase && !normalized.chars().any(char::is_uppercase) {
            violations.push(PasswordRule::MissingUppercase);
        }
        if self.require_lowercase && !normalized.chars().any(char::is_lowercase) {
            violations.push(PasswordRule::MissingLowercase);
        }
        if self.require_digit && !normalized.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PasswordRule::MissingDigit);
        }
        if self.require_special && !normalized.chars().any(is_special) {
            violations.push(PasswordRule::MissingSpecial);
        }

        // Control characters (except space, tab, newline)
        if normalized
            .chars()
            .any(|ch| ch.is_control() && ch != '\t' && ch != '\n')
        {
            violations.push(PasswordRule::InvalidCharacter);
        }

        if self.reject_common_patterns && is_common_pattern(&normalized) {
            violations.push(PasswordRule::CommonPattern);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PolicyViolations(violations))
        }
    }
}

fn is_special(ch: char) -> bool {
    !ch.is_alphanumeric() && !ch.is_whitespace() && !ch.is_control()
}

// ============================================================================
// Error Types
// ============================================================================

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordHashError {
    /// Hashing operation failed
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    /// Cost parameters rejected by Argon2
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    /// Invalid hash format
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Hashing cost
// ============================================================================

/// Argon2id cost parameters, fixed per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingCost {
    /// Memory in KiB
    pub memory_kib: u32,
    /// Iterations
    pub iterations: u32,
    /// Lanes
    pub parallelism: u32,
}

impl Default for HashingCost {
    /// OWASP recommended Argon2id parameters: m=19456 (19 MiB), t=2, p=1
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl HashingCost {
    /// Cheap parameters for tests
    pub const fn testing() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn argon2(&self) -> Result<Argon2<'static>, PasswordHashError> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordHashError::InvalidParams(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Construction only normalizes (NFKC); it does not apply the composition
/// policy, so login can verify passwords created under an older policy.
///
/// ## Security
/// - Implements `Zeroize` and `ZeroizeOnDrop`
/// - Does not implement `Clone` to prevent accidental copies
/// - Debug output is redacted
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Wrap user input, applying Unicode NFKC normalization
    pub fn new(mut raw: String) -> Self {
        let normalized: String = raw.nfkc().collect();
        raw.zeroize();
        Self(normalized)
    }

    /// Wrap user input and enforce the composition policy
    pub fn validated(raw: String, policy: &PasswordPolicy) -> Result<Self, PolicyViolations> {
        let password = Self::new(raw);
        policy.validate(&password.0)?;
        Ok(password)
    }

    /// Length in Unicode code points after normalization
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// Get the password as bytes for hashing
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn peppered(&self, pepper: Option<&[u8]>) -> Vec<u8> {
        let mut combined = self.as_bytes().to_vec();
        if let Some(p) = pepper {
            combined.extend_from_slice(p);
        }
        combined
    }

    /// Hash the password using Argon2id
    ///
    /// ## Arguments
    /// * `cost` - Deployment-wide Argon2 parameters
    /// * `pepper` - Optional application-wide secret for additional security
    ///
    /// ## Returns
    /// PHC-formatted hash string wrapped in `HashedPassword`
    pub fn hash(
        &self,
        cost: &HashingCost,
        pepper: Option<&[u8]>,
    ) -> Result<HashedPassword, PasswordHashError> {
        let mut password_bytes = self.peppered(pepper);

        // Random salt (128 bits), embedded in the PHC output
        let salt = SaltString::generate(OsRng);

        let result = cost
            .argon2()?
            .hash_password(&password_bytes, &salt)
            .map(|hash| HashedPassword {
                hash: hash.to_string(),
            })
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()));

        password_bytes.zeroize();
        result
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
///
/// The PHC string carries algorithm, version, parameters, salt and hash,
/// so verification does not need the current [`HashingCost`].
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    /// Get the PHC string for storage
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Verify a password against this hash
    ///
    /// Argon2 compares digests in constant time.
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let mut password_bytes = password.peppered(pepper);

        let verified = match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(&password_bytes, &parsed)
                .is_ok(),
            Err(_) => false,
        };

        password_bytes.zeroize();
        verified
    }

    /// Check if the hash was produced with different parameters than `cost`
    pub fn needs_rehash(&self, cost: &HashingCost) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.hash) else {
            return true;
        };

        if parsed.algorithm != Algorithm::Argon2id.ident() {
            return true;
        }

        match Params::try_from(&parsed) {
            Ok(params) => {
                params.m_cost() != cost.memory_kib
                    || params.t_cost() != cost.iterations
                    || params.p_cost() != cost.parallelism
            }
            Err(_) => true,
        }
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check for common weak patterns
fn is_common_pattern(password: &str) -> bool {
    let lower = password.to_lowercase();

    // All same character (e.g., "aaaaaaaa")
    let mut chars = lower.chars();
    if let Some(first) = chars.next() {
        if lower.chars().count() >= 3 && chars.all(|c| c == first) {
            return true;
        }
    }

    // Sequential numbers (e.g., "12345678")
    if is_sequential_numbers(&lower) {
        return true;
    }

    const KEYBOARD_PATTERNS: &[&str] = &[
        "qwerty",
        "asdfgh",
        "zxcvbn",
        "qazwsx",
        "1qaz2wsx",
    ];

    if KEYBOARD_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    const COMMON_PASSWORDS: &[&str] = &[
        "password",
        "password1",
        "password123",
        "password1!",
        "12345678",
        "123456789",
        "abcdefgh",
        "letmein",
        "welcome",
        "welcome1!",
        "admin123",
        "iloveyou",
        "sunshine",
        "princess",
        "football",
        "trustno1",
    ];

    COMMON_PASSWORDS.contains(&lower.as_str())
}

/// Check if the digits of a string form an ascending or descending run
fn is_sequential_numbers(s: &str) -> bool {
    let digits: Vec<u32> = s.chars().filter_map(|c| c.to_digit(10)).collect();

    // Only consider strings that are mostly digits
    if digits.len() < 4 || digits.len() * 2 < s.chars().count() {
        return false;
    }

    let is_ascending = digits
        .windows(2)
        .all(|w| w[1] == w[0] + 1 || (w[0] == 9 && w[1] == 0));

    let is_descending = digits
        .windows(2)
        .all(|w| w[0] == w[1] + 1 || (w[0] == 0 && w[1] == 9));

    is_ascending || is_descending
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordPolicy {
        PasswordPolicy::default()
    }

    #[test]
    fn test_weak_password_reports_every_rule() {
        let err = policy().validate("abc123").unwrap_err();
        assert!(err.contains(&PasswordRule::TooShort { min: 8 }));
        assert!(err.contains(&PasswordRule::MissingUppercase));
        assert!(err.contains(&PasswordRule::MissingSpecial));
        assert!(!err.contains(&PasswordRule::MissingLowercase));
        assert!(!err.contains(&PasswordRule::MissingDigit));
    }

    #[test]
    fn test_strong_password_accepted() {
        assert!(policy().validate("Str0ng!Passw0rd").is_ok());
        assert!(policy().validate("MySecure#Pass2024!").is_ok());
    }

    #[test]
    fn test_password_too_long() {
        let long_password = format!("Aa1!{}", "x".repeat(MAX_PASSWORD_LENGTH));
        let err = policy().validate(&long_password).unwrap_err();
        assert_eq!(
            err.rules(),
            &[PasswordRule::TooLong {
                max: MAX_PASSWORD_LENGTH
            }]
        );
    }

    #[test]
    fn test_common_pattern_rejected() {
        let err = policy().validate("Qwerty!234").unwrap_err();
        assert!(err.contains(&PasswordRule::CommonPattern));

        let err = policy().validate("Password1!").unwrap_err();
        assert!(err.contains(&PasswordRule::CommonPattern));
    }

    #[test]
    fn test_control_character_rejected() {
        let err = policy().validate("Str0ng!\u{7}Passw0rd").unwrap_err();
        assert_eq!(err.rules(), &[PasswordRule::InvalidCharacter]);
    }

    #[test]
    fn test_relaxed_policy() {
        let relaxed = PasswordPolicy {
            require_special: false,
            require_uppercase: false,
            ..PasswordPolicy::default()
        };
        assert!(relaxed.validate("lowercase2024").is_ok());
    }

    #[test]
    fn test_violation_message_lists_rules() {
        let err = policy().validate("abc").unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Password "));
        assert!(message.contains("at least 8 characters"));
        assert!(message.contains("uppercase"));
    }

    #[test]
    fn test_hash_and_verify() {
        let cost = HashingCost::testing();
        let password = ClearTextPassword::new("TestPassword123!".to_string());
        let hashed = password.hash(&cost, None).unwrap();

        assert!(hashed.verify(&password, None));

        let wrong_password = ClearTextPassword::new("WrongPassword123!".to_string());
        assert!(!hashed.verify(&wrong_password, None));
    }

    #[test]
    fn test_salt_is_embedded_and_random() {
        let cost = HashingCost::testing();
        let password = ClearTextPassword::new("TestPassword123!".to_string());
        let a = password.hash(&cost, None).unwrap();
        let b = password.hash(&cost, None).unwrap();
        assert_ne!(a.as_phc_string(), b.as_phc_string());
        assert!(a.as_phc_string().starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_with_pepper() {
        let cost = HashingCost::testing();
        let password = ClearTextPassword::new("TestPassword123!".to_string());
        let pepper = b"my_secret_pepper";
        let hashed = password.hash(&cost, Some(pepper)).unwrap();

        assert!(hashed.verify(&password, Some(pepper)));
        assert!(!hashed.verify(&password, None));
        assert!(!hashed.verify(&password, Some(b"wrong_pepper")));
    }

    #[test]
    fn test_nfkc_normalization_on_verify() {
        let cost = HashingCost::testing();
        // Fullwidth "Ａ" normalizes to "A"
        let hashed = ClearTextPassword::new("Ａbc123!xyz".to_string())
            .hash(&cost, None)
            .unwrap();
        assert!(hashed.verify(&ClearTextPassword::new("Abc123!xyz".to_string()), None));
    }

    #[test]
    fn test_needs_rehash() {
        let cost = HashingCost::testing();
        let hashed = ClearTextPassword::new("TestPassword123!".to_string())
            .hash(&cost, None)
            .unwrap();
        assert!(!hashed.needs_rehash(&cost));
        assert!(hashed.needs_rehash(&HashingCost::default()));
    }

    #[test]
    fn test_invalid_phc_string() {
        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new("secret".to_string());
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("secret"));
    }
}
