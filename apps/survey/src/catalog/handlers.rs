use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::arxiv::query::title_survey_query;
use crate::auth_client::AuthUser;
use crate::catalog::ingest::{store_papers, IngestOptions};
use crate::errors::AppError;
use crate::models::survey::SurveyRow;
use crate::state::AppState;

const DEFAULT_SEARCH_RESULTS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub max_results: Option<usize>,
}

/// GET /search
pub async fn handle_search(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SurveyRow>>, AppError> {
    let q = params.q.trim();
    if q.is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }
    let max_results = params.max_results.unwrap_or(DEFAULT_SEARCH_RESULTS);
    info!("User '{}' searching '{q}' (max {max_results})", user.username);

    let papers = state
        .papers
        .search(&title_survey_query(q, max_results))
        .await?;
    let opts = IngestOptions {
        keyword_count: 3,
        tags: Some(q.to_string()),
    };
    let surveys = store_papers(&state.db, &state.keywords, papers, &opts).await?;
    Ok(Json(surveys))
}
