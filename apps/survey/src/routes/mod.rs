pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::activity::handlers as activity;
use crate::catalog::handlers as catalog;
use crate::library::handlers as library;
use crate::recommend::handlers as recommend;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        // Library
        .route("/surveys/user", get(library::handle_list_user_surveys))
        .route("/surveys/add", post(library::handle_add_survey))
        .route(
            "/surveys/:id",
            get(library::handle_get_survey).delete(library::handle_remove_survey),
        )
        .route("/surveys/:id/status", put(library::handle_update_status))
        .route("/surveys/:id/star", put(library::handle_toggle_star))
        .route("/user/stats", get(library::handle_user_stats))
        // Catalog search
        .route("/search", get(catalog::handle_search))
        // Recommendations
        .route("/recommend/initial", post(recommend::handle_initial))
        .route("/recommend/personalized", post(recommend::handle_personalized))
        .route("/recommend/latest", post(recommend::handle_latest))
        // Reading streak
        .route("/activity/streak", get(activity::handle_streak))
        .with_state(state)
}
