//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (SHA-256, random tokens, Base64)
//! - Password hashing (Argon2id) and password policy
//! - Fixed-window rate limiting arithmetic
//! - Injectable clock
//! - Client identification from request headers

pub mod client;
pub mod clock;
pub mod crypto;
pub mod password;
pub mod rate_limit;
