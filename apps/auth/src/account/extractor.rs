use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use sqlx::PgPool;

use crate::account::session::SessionStore;
use crate::account::token::TokenIssuer;
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Resolution order: header present, two parts, bearer scheme, live Redis
/// session, valid token, existing user. Each failure is a 401 with its own message.
pub struct CurrentUser {
    pub user: UserRow,
    pub token: String,
}

/// Splits an Authorization header into `(scheme, credentials)`.
/// Returns `None` unless the header is exactly two whitespace-separated parts.
pub fn split_authorization(header: &str) -> Option<(&str, &str)> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(credentials), None) => Some((scheme, credentials)),
        _ => None,
    }
}

/// Extracts the token from a bearer Authorization header.
pub fn bearer_token(header: &str) -> Result<&str, AppError> {
    let (scheme, token) = split_authorization(header)
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized("Invalid authentication scheme"));
    }
    Ok(token)
}

pub fn authorization_header(parts: &Parts) -> Result<&str, AppError> {
    let value = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("Not authenticated"))?;
    value
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid authorization header"))
}

/// Answers whether a token still has a live session.
#[async_trait]
pub trait SessionLookup: Send + Sync {
    async fn is_live(&self, token: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait UserLookup: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, AppError>;
}

#[async_trait]
impl SessionLookup for SessionStore {
    async fn is_live(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.get(token).await?.is_some())
    }
}

#[async_trait]
impl UserLookup for PgPool {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>, AppError> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(self)
            .await?)
    }
}

/// Resolves a bearer token to its user: live session first, then a valid
/// token, then an existing user.
pub async fn resolve_user<S, U>(
    token: &str,
    sessions: &S,
    tokens: &TokenIssuer,
    users: &U,
) -> Result<UserRow, AppError>
where
    S: SessionLookup + ?Sized,
    U: UserLookup + ?Sized,
{
    if !sessions.is_live(token).await? {
        return Err(AppError::unauthorized("Session expired or invalid"));
    }

    let username = tokens
        .subject(token)
        .ok_or_else(|| AppError::unauthorized("Could not validate credentials"))?;

    users
        .find_by_username(&username)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(authorization_header(parts)?)?.to_string();
        let user = resolve_user(&token, &state.sessions, &state.tokens, &state.db).await?;
        Ok(CurrentUser { user, token })
    }
}
