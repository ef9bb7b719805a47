use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::activity::streak::activity_day;
use crate::auth_client::AuthUser;
use crate::errors::AppError;
use crate::models::survey::{SurveyRow, SurveyStatus, UserSurveyRow};
use crate::recommend::handlers::MIN_COMPLETED_FOR_PERSONALIZED;
use crate::state::AppState;

/// A library entry with its catalog row embedded.
#[derive(Debug, Serialize)]
pub struct UserSurveyResponse {
    #[serde(flatten)]
    pub entry: UserSurveyRow,
    pub survey: Option<SurveyRow>,
}

#[derive(Debug, Serialize)]
pub struct SurveyDetail {
    pub survey: SurveyRow,
    pub user_survey: Option<UserSurveyRow>,
}

#[derive(Debug, Deserialize)]
pub struct StatusFilterParams {
    pub status_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ViewParams {
    pub increase_view: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddSurveyRequest {
    pub survey_id: i32,
    #[serde(default)]
    pub status: SurveyStatus,
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub new_status: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserStats {
    pub saved_surveys: i64,
    pub completed_surveys: i64,
    pub recommended_surveys: i64,
    pub can_use_personalized: bool,
}

/// What a status change writes besides the status itself.
#[derive(Debug, PartialEq, Eq)]
struct StatusEffects {
    completed_at: Option<DateTime<Utc>>,
    /// Day whose activity count goes up by one.
    activity_day: Option<NaiveDate>,
}

fn status_effects(status: SurveyStatus, now: DateTime<Utc>) -> StatusEffects {
    if status == SurveyStatus::Completed {
        StatusEffects {
            completed_at: Some(now),
            activity_day: Some(activity_day(now)),
        }
    } else {
        StatusEffects {
            completed_at: None,
            activity_day: None,
        }
    }
}

/// Views are counted only for papers in the caller's library, and only
/// when the caller asks (the default).
fn counts_view(in_library: bool, increase_view: Option<bool>) -> bool {
    in_library && increase_view.unwrap_or(true)
}

fn ensure_not_added<T>(existing: Option<T>) -> Result<(), AppError> {
    match existing {
        Some(_) => Err(AppError::Validation("Survey already added".to_string())),
        None => Ok(()),
    }
}

fn ensure_removed(rows_affected: u64) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(
            "Survey not found in user's collection".to_string(),
        ));
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<SurveyStatus, AppError> {
    raw.parse::<SurveyStatus>().map_err(AppError::Validation)
}

async fn find_survey(state: &AppState, id: i32) -> Result<Option<SurveyRow>, AppError> {
    Ok(sqlx::query_as("SELECT * FROM surveys WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?)
}

async fn find_entry(
    state: &AppState,
    user_id: i32,
    user_survey_id: i32,
) -> Result<UserSurveyRow, AppError> {
    let entry: Option<UserSurveyRow> =
        sqlx::query_as("SELECT * FROM user_surveys WHERE id = $1 AND user_id = $2")
            .bind(user_survey_id)
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    entry.ok_or_else(|| AppError::NotFound("User survey not found".to_string()))
}

/// GET /surveys/user
pub async fn handle_list_user_surveys(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<StatusFilterParams>,
) -> Result<Json<Vec<UserSurveyResponse>>, AppError> {
    let filter = match params.status_filter.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_status(raw)?),
    };

    let entries: Vec<UserSurveyRow> = sqlx::query_as(
        r#"
        SELECT * FROM user_surveys
        WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
        ORDER BY added_at DESC, id DESC
        "#,
    )
    .bind(user.user_id)
    .bind(filter.map(|s| s.as_str()))
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<i32> = entries.iter().map(|e| e.survey_id).collect();
    let surveys: Vec<SurveyRow> = sqlx::query_as("SELECT * FROM surveys WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&state.db)
        .await?;

    let response = entries
        .into_iter()
        .map(|entry| {
            let survey = surveys.iter().find(|s| s.id == entry.survey_id).cloned();
            UserSurveyResponse { entry, survey }
        })
        .collect();
    Ok(Json(response))
}

/// GET /surveys/:id
///
/// Counts a view only for papers in the caller's library.
pub async fn handle_get_survey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(survey_id): Path<i32>,
    Query(params): Query<ViewParams>,
) -> Result<Json<SurveyDetail>, AppError> {
    let survey = find_survey(&state, survey_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Survey not found".to_string()))?;

    let user_survey: Option<UserSurveyRow> =
        sqlx::query_as("SELECT * FROM user_surveys WHERE user_id = $1 AND survey_id = $2")
            .bind(user.user_id)
            .bind(survey_id)
            .fetch_optional(&state.db)
            .await?;

    let survey = if counts_view(user_survey.is_some(), params.increase_view) {
        sqlx::query_as::<_, SurveyRow>(
            "UPDATE surveys SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
        )
        .bind(survey_id)
        .fetch_one(&state.db)
        .await?
    } else {
        survey
    };

    Ok(Json(SurveyDetail {
        survey,
        user_survey,
    }))
}

/// POST /surveys/add
pub async fn handle_add_survey(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddSurveyRequest>,
) -> Result<Json<UserSurveyResponse>, AppError> {
    let existing: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM user_surveys WHERE user_id = $1 AND survey_id = $2")
            .bind(user.user_id)
            .bind(req.survey_id)
            .fetch_optional(&state.db)
            .await?;
    ensure_not_added(existing)?;

    let survey = find_survey(&state, req.survey_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Survey not found".to_string()))?;

    let entry: Option<UserSurveyRow> = sqlx::query_as(
        r#"
        INSERT INTO user_surveys (user_id, survey_id, status)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, survey_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(req.survey_id)
    .bind(req.status.as_str())
    .fetch_optional(&state.db)
    .await?;
    // Lost a race with a concurrent add of the same paper.
    let Some(entry) = entry else {
        return Err(AppError::Validation("Survey already added".to_string()));
    };

    info!(
        "User '{}' added survey {} as {}",
        user.username, req.survey_id, req.status
    );
    Ok(Json(UserSurveyResponse {
        entry,
        survey: Some(survey),
    }))
}

/// PUT /surveys/:id/status
///
/// `id` is the library entry id. Completing a paper records today's activity.
pub async fn handle_update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_survey_id): Path<i32>,
    Query(params): Query<StatusParams>,
) -> Result<Json<Value>, AppError> {
    let entry = find_entry(&state, user.user_id, user_survey_id).await?;
    let status = parse_status(&params.new_status)?;

    let effects = status_effects(status, Utc::now());

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "UPDATE user_surveys SET status = $1, completed_at = COALESCE($2, completed_at) WHERE id = $3",
    )
    .bind(status.as_str())
    .bind(effects.completed_at)
    .bind(entry.id)
    .execute(&mut *tx)
    .await?;
    if let Some(day) = effects.activity_day {
        sqlx::query(
            r#"
            INSERT INTO user_activities (user_id, activity_date, survey_views)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id, activity_date)
            DO UPDATE SET survey_views = user_activities.survey_views + 1
            "#,
        )
        .bind(user.user_id)
        .bind(day)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("User '{}' set entry {} to {status}", user.username, entry.id);
    Ok(Json(json!({ "message": "Status updated successfully" })))
}

/// PUT /surveys/:id/star
pub async fn handle_toggle_star(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_survey_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let entry = find_entry(&state, user.user_id, user_survey_id).await?;
    let (is_starred,): (bool,) = sqlx::query_as(
        "UPDATE user_surveys SET is_starred = NOT is_starred WHERE id = $1 RETURNING is_starred",
    )
    .bind(entry.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "message": "Star toggled successfully",
        "is_starred": is_starred
    })))
}

/// DELETE /surveys/:id
///
/// `id` is the catalog survey id, unlike the status and star routes.
pub async fn handle_remove_survey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(survey_id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let result = sqlx::query("DELETE FROM user_surveys WHERE user_id = $1 AND survey_id = $2")
        .bind(user.user_id)
        .bind(survey_id)
        .execute(&state.db)
        .await?;
    ensure_removed(result.rows_affected())?;
    Ok(Json(json!({ "message": "Survey removed successfully" })))
}

fn stats_from_counts(saved: i64, completed: i64, recommended: i64) -> UserStats {
    UserStats {
        saved_surveys: saved,
        completed_surveys: completed,
        recommended_surveys: recommended,
        can_use_personalized: completed >= MIN_COMPLETED_FOR_PERSONALIZED as i64,
    }
}

/// GET /user/stats
pub async fn handle_user_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserStats>, AppError> {
    let (saved, completed, recommended): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'completed'),
               COUNT(*) FILTER (WHERE status = 'recommended')
        FROM user_surveys
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(stats_from_counts(saved, completed, recommended)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn test_invalid_status_is_validation_error() {
        assert!(matches!(parse_status("archived"), Err(AppError::Validation(_))));
        assert_eq!(parse_status("reading").unwrap(), SurveyStatus::Reading);
    }

    #[test]
    fn test_personalized_unlocks_at_five_completed() {
        assert!(!stats_from_counts(10, 4, 0).can_use_personalized);
        assert!(stats_from_counts(10, 5, 0).can_use_personalized);
    }

    #[test]
    fn test_add_request_defaults_to_saved() {
        let req: AddSurveyRequest = serde_json::from_str(r#"{"survey_id": 7}"#).unwrap();
        assert_eq!(req.survey_id, 7);
        assert_eq!(req.status, SurveyStatus::Saved);
    }

    #[test]
    fn test_library_entry_embeds_survey_next_to_entry_fields() {
        let response = UserSurveyResponse {
            entry: UserSurveyRow {
                id: 3,
                user_id: 42,
                survey_id: 7,
                status: "reading".to_string(),
                is_starred: true,
                added_at: Utc::now(),
                completed_at: None,
            },
            survey: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["status"], "reading");
        assert!(value["survey"].is_null());
        assert!(value.get("entry").is_none());
    }

    #[test]
    fn test_completing_stamps_time_and_credits_today() {
        let now = Utc::now();
        assert_eq!(
            status_effects(SurveyStatus::Completed, now),
            StatusEffects {
                completed_at: Some(now),
                activity_day: Some(now.date_naive()),
            }
        );
    }

    #[test]
    fn test_other_statuses_leave_completion_alone() {
        let now = Utc::now();
        for status in [SurveyStatus::Saved, SurveyStatus::Reading, SurveyStatus::Recommended] {
            let effects = status_effects(status, now);
            assert_eq!(effects.completed_at, None);
            assert_eq!(effects.activity_day, None);
        }
    }

    #[test]
    fn test_view_counted_only_in_library_and_when_requested() {
        assert!(counts_view(true, None));
        assert!(counts_view(true, Some(true)));
        assert!(!counts_view(true, Some(false)));
        assert!(!counts_view(false, None));
        assert!(!counts_view(false, Some(true)));
    }

    #[test]
    fn test_second_add_is_rejected() {
        assert!(ensure_not_added::<(i32,)>(None).is_ok());
        let err = ensure_not_added(Some((11,))).unwrap_err();
        assert!(matches!(&err, AppError::Validation(msg) if msg == "Survey already added"));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_removing_absent_entry_is_not_found() {
        assert!(ensure_removed(1).is_ok());
        let err = ensure_removed(0).unwrap_err();
        assert!(
            matches!(&err, AppError::NotFound(msg) if msg == "Survey not found in user's collection")
        );
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }
}
