use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A paper in the shared catalog. One row per arXiv id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SurveyRow {
    pub id: i32,
    pub arxiv_id: String,
    pub title: String,
    #[sqlx(rename = "abstract")]
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub authors: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub pdf_url: Option<String>,
    pub categories: Option<String>,
    pub difficulty_level: Option<String>,
    pub estimated_reading_time_beginner: Option<i32>,
    pub estimated_reading_time_intermediate: Option<i32>,
    pub estimated_reading_time_advanced: Option<i32>,
    pub tags: Option<String>,
    pub view_count: i32,
    pub citation_count: i32,
    pub created_at: DateTime<Utc>,
}

/// A paper in one user's library.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSurveyRow {
    pub id: i32,
    pub user_id: i32,
    pub survey_id: i32,
    pub status: String,
    pub is_starred: bool,
    pub added_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    /// Saved from a direct search.
    #[default]
    Saved,
    /// Saved from a recommendation.
    Recommended,
    Reading,
    Completed,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Saved => "saved",
            SurveyStatus::Recommended => "recommended",
            SurveyStatus::Reading => "reading",
            SurveyStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SurveyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "saved" => Ok(SurveyStatus::Saved),
            "recommended" => Ok(SurveyStatus::Recommended),
            "reading" => Ok(SurveyStatus::Reading),
            "completed" => Ok(SurveyStatus::Completed),
            other => Err(format!(
                "'{other}' is not a valid status (expected saved, recommended, reading or completed)"
            )),
        }
    }
}
