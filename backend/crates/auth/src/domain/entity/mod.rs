//! Domain Entities

pub mod account;
pub mod audit_event;
pub mod login_failures;
pub mod session;
