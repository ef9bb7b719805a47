use axum::{extract::State, Json};
use chrono::Utc;

use crate::activity::streak::{activity_day, build_streak, window_start, Streak};
use crate::auth_client::AuthUser;
use crate::errors::AppError;
use crate::models::activity::DailyActivity;
use crate::state::AppState;

/// GET /activity/streak
pub async fn handle_streak(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Streak>, AppError> {
    let today = activity_day(Utc::now());
    let activities: Vec<DailyActivity> = sqlx::query_as(
        r#"
        SELECT activity_date, survey_views FROM user_activities
        WHERE user_id = $1 AND activity_date BETWEEN $2 AND $3
        "#,
    )
    .bind(user.user_id)
    .bind(window_start(today))
    .bind(today)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(build_streak(today, &activities)))
}
