use sqlx::PgPool;

use crate::account::session::SessionStore;
use crate::account::token::TokenIssuer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub sessions: SessionStore,
    pub tokens: TokenIssuer,
}
