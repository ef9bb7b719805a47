use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub nickname: Option<String>,
    pub profile_image: Option<String>,
    pub background_image: Option<String>,
    pub email: String,
    pub hashed_password: String,
    pub interest_fields: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub interest_fields: Option<String>,
    pub profile_image: Option<String>,
    pub background_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            nickname: row.nickname,
            interest_fields: row.interest_fields,
            profile_image: row.profile_image,
            background_image: row.background_image,
            created_at: row.created_at,
        }
    }
}
