//! Value Object Module

pub mod identity;
pub mod rate_limit_action;
pub mod user_name;
