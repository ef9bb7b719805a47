use axum::{extract::State, Json};
use tracing::info;

use crate::account::extractor::CurrentUser;
use crate::errors::AppError;
use crate::models::user::{UserResponse, UserRow};
use crate::profile::patch::ProfilePatch;
use crate::state::AppState;

/// GET /user/profile
pub async fn handle_get_profile(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}

/// PUT /user/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<UserResponse>, AppError> {
    let mut user = current.user;
    patch.apply(&mut user);

    let updated: UserRow = sqlx::query_as(
        r#"
        UPDATE users
        SET nickname = $1,
            profile_image = $2,
            background_image = $3,
            interest_fields = $4,
            updated_at = now()
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&user.nickname)
    .bind(&user.profile_image)
    .bind(&user.background_image)
    .bind(&user.interest_fields)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    info!("Updated profile for user {}", updated.id);
    Ok(Json(updated.into()))
}
