use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::account::extractor::{split_authorization, CurrentUser};
use crate::account::password::{hash_password, verify_password};
use crate::account::session::Session;
use crate::account::validation::{
    normalize_username, validate_email, validate_password, validate_username,
};
use crate::errors::AppError;
use crate::models::user::{UserResponse, UserRow};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub nickname: Option<String>,
    pub interest_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub user_id: i32,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPasswordRequest {
    pub password: Option<String>,
}

/// Joins the registration interest list into the stored comma-separated form.
pub fn join_interest_fields(fields: Option<&[String]>) -> Option<String> {
    match fields {
        Some(fields) if !fields.is_empty() => Some(fields.join(",")),
        _ => None,
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Issues a token for `user` and registers its session.
async fn start_session(state: &AppState, user: UserRow) -> Result<TokenResponse, AppError> {
    let access_token = state.tokens.issue(&user.username)?;
    let session = Session {
        user_id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
    };
    state.sessions.create(&access_token, &session).await?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer",
        user: user.into(),
    })
}

/// POST /register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    info!("Registration attempt for '{}'", req.username);

    validate_username(&req.username)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    let username = normalize_username(&req.username);

    let existing: Option<i32> =
        sqlx::query_scalar("SELECT id FROM users WHERE username = $1 OR email = $2 LIMIT 1")
            .bind(username)
            .bind(&req.email)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_some() {
        warn!("Registration rejected: '{username}' or its email already exists");
        return Err(AppError::Validation(
            "Username or email already exists".to_string(),
        ));
    }

    let hashed_password = hash_password(&req.password)?;
    let interest_fields = join_interest_fields(req.interest_fields.as_deref());

    let user: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, hashed_password, nickname, interest_fields)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(username)
    .bind(&req.email)
    .bind(&hashed_password)
    .bind(&req.nickname)
    .bind(&interest_fields)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Validation("Username or email already exists".to_string())
        } else {
            AppError::Database(e)
        }
    })?;

    info!("Registered user '{}' (id {})", user.username, user.id);
    Ok(Json(start_session(&state, user).await?))
}

/// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let username = normalize_username(&req.username);
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&state.db)
        .await?;

    let user = match user {
        Some(user) if verify_password(&req.password, &user.hashed_password) => user,
        _ => {
            warn!("Login failed for '{username}'");
            return Err(AppError::unauthorized("Incorrect username or password"));
        }
    };

    info!("Login succeeded for '{}' (id {})", user.username, user.id);
    Ok(Json(start_session(&state, user).await?))
}

/// POST /logout
///
/// Removes the session for the presented token. The token is not otherwise
/// validated: logging out twice, or with an unknown token, still succeeds.
pub async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
    let (_, token) = header
        .to_str()
        .ok()
        .and_then(split_authorization)
        .ok_or_else(|| AppError::Validation("Invalid token".to_string()))?;

    state.sessions.delete(token).await?;
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// GET /me
pub async fn handle_me(current: CurrentUser) -> Json<UserResponse> {
    Json(current.user.into())
}

/// GET /verify
///
/// Called by sibling services to resolve a bearer token to a user.
pub async fn handle_verify(current: CurrentUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user_id: current.user.id,
        username: current.user.username,
    })
}

/// POST /verify-password
pub async fn handle_verify_password(
    current: CurrentUser,
    Json(req): Json<VerifyPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

    if !verify_password(&password, &current.user.hashed_password) {
        return Err(AppError::unauthorized("Incorrect password"));
    }

    Ok(Json(json!({ "message": "Password verified successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_fields_joined_with_commas() {
        let fields = vec!["NLP".to_string(), "Computer Vision".to_string()];
        assert_eq!(
            join_interest_fields(Some(fields.as_slice())).as_deref(),
            Some("NLP,Computer Vision")
        );
    }

    #[test]
    fn test_empty_interest_fields_stored_as_null() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(join_interest_fields(Some(empty.as_slice())), None);
        assert_eq!(join_interest_fields(None), None);
    }

    #[test]
    fn test_verify_password_request_tolerates_missing_field() {
        let req: VerifyPasswordRequest = serde_json::from_str("{}").unwrap();
        assert!(req.password.is_none());
    }
}
