use chrono::NaiveDate;
use sqlx::FromRow;

/// Papers completed by a user on one calendar day.
#[derive(Debug, Clone, FromRow)]
pub struct DailyActivity {
    pub activity_date: NaiveDate,
    pub survey_views: i32,
}
