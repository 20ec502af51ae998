//! User Name Value Object
//!
//! ユーザー名はアカウントを識別する不変のキー。
//! ログイン、監査ログ、セッション管理に使用される。
//!
//! ## 設計方針
//! - ASCII文字のみ許可（a-z, 0-9, _ . - +）
//! - 大文字入力は受け付けるが、canonical（正規形）は小文字
//! - NFKC正規化 → trim → 小文字化 → 検証 の順で処理
//! - 一意性は canonical で判定する
//!
//! ## 不変条件
//! - 長さ: 3〜30文字（正規化後）
//! - 先頭・末尾: 英数字または `_`
//! - 連続ドット禁止（`..`）
//! - 予約語禁止

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Minimum length for user name (in characters)
pub const USER_NAME_MIN_LENGTH: usize = 3;

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 30;

/// Allowed special characters in user name
const ALLOWED_SPECIAL_CHARS: &[char] = &['_', '.', '-', '+'];

/// Names that would collide with routes or impersonate staff
const RESERVED_WORDS: &[&str] = &[
    "admin",
    "administrator",
    "root",
    "system",
    "superuser",
    "moderator",
    "staff",
    "support",
    "security",
    "api",
    "auth",
    "login",
    "logout",
    "register",
    "refresh",
    "sessions",
    "password",
    "null",
    "undefined",
    "anonymous",
    "unknown",
];

/// Error returned when user name validation fails
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserNameError {
    #[error("User name cannot be empty")]
    Empty,

    #[error("User name is too short ({length} chars, minimum {min})")]
    TooShort { length: usize, min: usize },

    #[error("User name is too long ({length} chars, maximum {max})")]
    TooLong { length: usize, max: usize },

    #[error("Invalid character '{ch}' in user name. Only a-z, 0-9, _, ., -, + are allowed")]
    InvalidCharacter { ch: char },

    #[error("User name must start and end with a-z, 0-9, or _")]
    InvalidBoundary,

    #[error("User name cannot contain consecutive dots (..)")]
    ConsecutiveDots,

    #[error("'{0}' is a reserved user name")]
    Reserved(String),
}

/// Validated, normalized user name
///
/// # Storage
/// - `original`: NFKC-normalized, trimmed input (preserves case)
/// - `canonical`: lowercase form, the uniqueness key
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserName {
    original: String,
    canonical: String,
}

impl UserName {
    /// Normalize and validate raw input
    pub fn new(input: impl AsRef<str>) -> Result<Self, UserNameError> {
        let original: String = input.as_ref().nfkc().collect::<String>().trim().to_string();
        let canonical = original.to_lowercase();
        Self::validate(&canonical)?;
        Ok(Self {
            original,
            canonical,
        })
    }

    /// Rebuild from stored values (already validated on insert)
    pub fn from_db(original: &str) -> Self {
        Self {
            original: original.to_string(),
            canonical: original.to_lowercase(),
        }
    }

    #[inline]
    pub fn original(&self) -> &str {
        &self.original
    }

    #[inline]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    fn validate(canonical: &str) -> Result<(), UserNameError> {
        if canonical.is_empty() {
            return Err(UserNameError::Empty);
        }

        let length = canonical.chars().count();
        if length < USER_NAME_MIN_LENGTH {
            return Err(UserNameError::TooShort {
                length,
                min: USER_NAME_MIN_LENGTH,
            });
        }
        if length > USER_NAME_MAX_LENGTH {
            return Err(UserNameError::TooLong {
                length,
                max: USER_NAME_MAX_LENGTH,
            });
        }

        if let Some(ch) = canonical.chars().find(|&c| !Self::is_valid_char(c)) {
            return Err(UserNameError::InvalidCharacter { ch });
        }

        let boundary_ok = |c: Option<char>| {
            c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        };
        if !boundary_ok(canonical.chars().next()) || !boundary_ok(canonical.chars().next_back()) {
            return Err(UserNameError::InvalidBoundary);
        }

        if canonical.contains("..") {
            return Err(UserNameError::ConsecutiveDots);
        }

        if RESERVED_WORDS.contains(&canonical) {
            return Err(UserNameError::Reserved(canonical.to_string()));
        }

        Ok(())
    }

    #[inline]
    fn is_valid_char(c: char) -> bool {
        c.is_ascii_lowercase() || c.is_ascii_digit() || ALLOWED_SPECIAL_CHARS.contains(&c)
    }
}

impl fmt::Debug for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserName").field(&self.canonical).finish()
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl AsRef<str> for UserName {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

impl TryFrom<String> for UserName {
    type Error = UserNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserName> for String {
    fn from(name: UserName) -> Self {
        name.original
    }
}
