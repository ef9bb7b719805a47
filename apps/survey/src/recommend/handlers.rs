use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::arxiv::query::{ai_ml_survey_query, category_survey_query, recommendation_pool_query};
use crate::auth_client::AuthUser;
use crate::catalog::ingest::{store_papers, IngestOptions};
use crate::errors::AppError;
use crate::models::survey::{SurveyRow, SurveyStatus};
use crate::recommend::{PaperText, Ranking};
use crate::state::AppState;

/// Completed papers needed before personalised recommendations unlock.
pub const MIN_COMPLETED_FOR_PERSONALIZED: usize = 5;

const INITIAL_POOL_SIZE: usize = 500;
const PERSONALIZED_POOL_SIZE: usize = 500;
const DEFAULT_TOP_N: usize = 500;
const DEFAULT_LATEST_RESULTS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct InterestFieldsRequest {
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LatestRequest {
    #[serde(default)]
    pub fields: Vec<String>,
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PersonalizedParams {
    pub top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub survey: SurveyRow,
    /// Cosine similarity as a percentage, two decimals.
    pub similarity_score: f64,
}

pub fn to_percent(similarity: f64) -> f64 {
    (similarity * 10_000.0).round() / 100.0
}

fn non_empty_fields(fields: Vec<String>) -> Result<Vec<String>, AppError> {
    let fields: Vec<String> = fields
        .into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return Err(AppError::Validation(
            "At least one interest field is required".to_string(),
        ));
    }
    Ok(fields)
}

fn ensure_enough_completed(completed: usize) -> Result<(), AppError> {
    if completed < MIN_COMPLETED_FOR_PERSONALIZED {
        return Err(AppError::Validation(format!(
            "At least {MIN_COMPLETED_FOR_PERSONALIZED} completed surveys are required for personalized recommendations"
        )));
    }
    Ok(())
}

/// Runs a ranking on the blocking pool.
async fn rank_blocking<F>(f: F) -> Result<Ranking, AppError>
where
    F: FnOnce() -> Ranking + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Ranking task failed: {e}")))
}

/// Pairs each ranked id with its catalog row, keeping ranking order.
fn attach_surveys(ranking: Ranking, rows: &[SurveyRow]) -> Vec<Recommendation> {
    let by_id: HashMap<i32, &SurveyRow> = rows.iter().map(|r| (r.id, r)).collect();
    ranking
        .into_iter()
        .filter_map(|(id, sim)| {
            by_id.get(&id).map(|row| Recommendation {
                survey: (*row).clone(),
                similarity_score: to_percent(sim),
            })
        })
        .collect()
}

/// Catalog rows deduplicated by id, first occurrence wins.
fn unique_rows(rows: Vec<SurveyRow>) -> Vec<SurveyRow> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter().filter(|r| seen.insert(r.id)).collect()
}

/// POST /recommend/initial
pub async fn handle_initial(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<InterestFieldsRequest>,
) -> Result<Json<Vec<SurveyRow>>, AppError> {
    let fields = non_empty_fields(req.fields)?;
    info!("Initial recommendations for '{}': {fields:?}", user.username);

    let papers = state
        .papers
        .search(&ai_ml_survey_query(&fields, INITIAL_POOL_SIZE))
        .await?;
    let opts = IngestOptions {
        keyword_count: 3,
        tags: Some(fields.join(", ")),
    };
    let surveys = store_papers(&state.db, &state.keywords, papers, &opts).await?;
    Ok(Json(surveys))
}

/// POST /recommend/personalized
pub async fn handle_personalized(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<PersonalizedParams>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let top_n = params.top_n.unwrap_or(DEFAULT_TOP_N);

    let read: Vec<SurveyRow> = sqlx::query_as(
        r#"
        SELECT s.* FROM surveys s
        JOIN user_surveys us ON us.survey_id = s.id
        WHERE us.user_id = $1 AND us.status = $2
        "#,
    )
    .bind(user.user_id)
    .bind(SurveyStatus::Completed.as_str())
    .fetch_all(&state.db)
    .await?;

    info!(
        "User '{}' requested personalised recommendations (top {top_n}), {} completed",
        user.username,
        read.len()
    );
    ensure_enough_completed(read.len())?;

    let papers = state
        .papers
        .search(&recommendation_pool_query(PERSONALIZED_POOL_SIZE))
        .await?;
    let opts = IngestOptions {
        keyword_count: 5,
        tags: None,
    };
    let pool = unique_rows(store_papers(&state.db, &state.keywords, papers, &opts).await?);

    let read_texts: Vec<PaperText> = read.iter().map(PaperText::from).collect();
    let candidate_texts: Vec<PaperText> = pool.iter().map(PaperText::from).collect();
    let recommender = state.recommender.clone();
    let ranking = rank_blocking(move || {
        recommender.recommend(&read_texts, &candidate_texts, top_n)
    })
    .await?;

    info!("Generated {} recommendations", ranking.len());
    Ok(Json(attach_surveys(ranking, &pool)))
}

/// POST /recommend/latest
///
/// Newest surveys in the arXiv categories behind the interest fields,
/// ranked by similarity to the fields themselves.
pub async fn handle_latest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<LatestRequest>,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    let fields = non_empty_fields(req.fields)?;
    let max_results = req.max_results.unwrap_or(DEFAULT_LATEST_RESULTS);
    info!("Latest surveys for '{}': {fields:?}", user.username);

    let papers = state
        .papers
        .search(&category_survey_query(&fields, max_results))
        .await?;
    let opts = IngestOptions {
        keyword_count: 3,
        tags: Some(fields.join(", ")),
    };
    let pool = unique_rows(store_papers(&state.db, &state.keywords, papers, &opts).await?);

    let candidate_texts: Vec<PaperText> = pool.iter().map(PaperText::from).collect();
    let top_n = candidate_texts.len();
    let recommender = state.recommender.clone();
    let ranking = rank_blocking(move || {
        recommender.recommend_by_interest(&fields, &candidate_texts, top_n)
    })
    .await?;

    Ok(Json(attach_surveys(ranking, &pool)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};
    use chrono::Utc;

    fn row(id: i32) -> SurveyRow {
        SurveyRow {
            id,
            arxiv_id: format!("2400.{id:05}"),
            title: format!("Survey {id}"),
            abstract_text: None,
            keywords: None,
            authors: None,
            published_date: None,
            pdf_url: None,
            categories: None,
            difficulty_level: None,
            estimated_reading_time_beginner: None,
            estimated_reading_time_intermediate: None,
            estimated_reading_time_advanced: None,
            tags: None,
            view_count: 0,
            citation_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_percent_rounds_to_two_decimals() {
        assert_eq!(to_percent(0.123456), 12.35);
        assert_eq!(to_percent(1.0), 100.0);
        assert_eq!(to_percent(0.0), 0.0);
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert!(matches!(
            non_empty_fields(vec![" ".into(), String::new()]),
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            non_empty_fields(vec![" NLP ".into()]).unwrap(),
            vec!["NLP".to_string()]
        );
    }

    #[test]
    fn test_attach_keeps_ranking_order_and_skips_unknown_ids() {
        let rows = vec![row(1), row(2), row(3)];
        let out = attach_surveys(vec![(3, 0.5), (9, 0.4), (1, 0.25)], &rows);
        let ids: Vec<i32> = out.iter().map(|r| r.survey.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(out[0].similarity_score, 50.0);
    }

    #[test]
    fn test_personalized_needs_five_completed() {
        for completed in 0..MIN_COMPLETED_FOR_PERSONALIZED {
            let err = ensure_enough_completed(completed).unwrap_err();
            assert!(matches!(&err, AppError::Validation(msg) if msg.starts_with("At least 5 completed")));
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
        assert!(ensure_enough_completed(5).is_ok());
        assert!(ensure_enough_completed(40).is_ok());
    }

    #[test]
    fn test_unique_rows() {
        let ids: Vec<i32> = unique_rows(vec![row(1), row(2), row(1)])
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
