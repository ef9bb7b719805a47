use std::sync::Arc;

use sqlx::PgPool;

use crate::arxiv::PaperSource;
use crate::auth_client::AuthClient;
use crate::recommend::Recommender;
use crate::text::keywords::KeywordExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth: AuthClient,
    pub papers: Arc<dyn PaperSource>,
    pub keywords: Arc<KeywordExtractor>,
    pub recommender: Arc<dyn Recommender>,
}
