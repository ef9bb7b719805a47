pub mod handlers;
pub mod streak;
