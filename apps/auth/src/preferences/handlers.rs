use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::account::extractor::CurrentUser;
use crate::errors::AppError;
use crate::models::preference::UserPreferenceRow;
use crate::state::AppState;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PreferenceRequest {
    pub preferred_difficulty: Option<String>,
    pub ai_stacks: Option<String>,
    pub domains: Option<String>,
    pub keywords: Option<String>,
}

/// Column values after applying `req` to `existing`.
///
/// A first write stores the request as-is. Later writes only overwrite a
/// column when the request carries a non-empty value for it.
pub fn merge_preferences(
    existing: Option<&UserPreferenceRow>,
    req: PreferenceRequest,
) -> PreferenceRequest {
    let Some(existing) = existing else {
        return req;
    };

    fn pick(new: Option<String>, old: &Option<String>) -> Option<String> {
        match new {
            Some(v) if !v.is_empty() => Some(v),
            _ => old.clone(),
        }
    }

    PreferenceRequest {
        preferred_difficulty: pick(req.preferred_difficulty, &existing.preferred_difficulty),
        ai_stacks: pick(req.ai_stacks, &existing.ai_stacks),
        domains: pick(req.domains, &existing.domains),
        keywords: pick(req.keywords, &existing.keywords),
    }
}

async fn find_preferences(
    state: &AppState,
    user_id: i32,
) -> Result<Option<UserPreferenceRow>, AppError> {
    Ok(
        sqlx::query_as("SELECT * FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?,
    )
}

/// POST /preferences
pub async fn handle_upsert_preferences(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(req): Json<PreferenceRequest>,
) -> Result<Json<UserPreferenceRow>, AppError> {
    let user_id = current.user.id;
    let existing = find_preferences(&state, user_id).await?;
    let merged = merge_preferences(existing.as_ref(), req);

    let row: UserPreferenceRow = sqlx::query_as(
        r#"
        INSERT INTO user_preferences (user_id, preferred_difficulty, ai_stacks, domains, keywords)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE
        SET preferred_difficulty = EXCLUDED.preferred_difficulty,
            ai_stacks = EXCLUDED.ai_stacks,
            domains = EXCLUDED.domains,
            keywords = EXCLUDED.keywords,
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&merged.preferred_difficulty)
    .bind(&merged.ai_stacks)
    .bind(&merged.domains)
    .bind(&merged.keywords)
    .fetch_one(&state.db)
    .await?;

    info!(
        "{} preferences for user {user_id}",
        if existing.is_some() { "Updated" } else { "Created" }
    );
    Ok(Json(row))
}

/// GET /preferences
pub async fn handle_get_preferences(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<UserPreferenceRow>, AppError> {
    find_preferences(&state, current.user.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Preferences not found".to_string()))
}
