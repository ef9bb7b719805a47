//! Accounts: registration, login, sessions and bearer-token resolution.

pub mod extractor;
pub mod handlers;
pub mod password;
pub mod session;
pub mod token;
pub mod validation;
