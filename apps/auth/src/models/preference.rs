use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserPreferenceRow {
    pub id: i32,
    pub user_id: i32,
    pub preferred_difficulty: Option<String>,
    pub ai_stacks: Option<String>,
    pub domains: Option<String>,
    pub keywords: Option<String>,
    #[serde(skip_serializing)]
    pub updated_at: DateTime<Utc>,
}
