//! Daily completion history for the contribution-style streak calendar.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::models::activity::DailyActivity;

pub const STREAK_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakDay {
    pub date: NaiveDate,
    pub count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub streak_data: Vec<StreakDay>,
    pub total_days_active: usize,
}

/// The calendar day an activity at `now` is credited to. Days are UTC days,
/// both when completions are recorded and when the streak window is built.
pub fn activity_day(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// First day included in the window ending at `today`.
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today - Duration::days(STREAK_DAYS - 1)
}

/// One entry per day, oldest first, ending at `today`. Days without a
/// record count zero. Records outside the window are ignored.
pub fn build_streak(today: NaiveDate, activities: &[DailyActivity]) -> Streak {
    let start = window_start(today);
    let in_window: HashMap<NaiveDate, i32> = activities
        .iter()
        .filter(|a| a.activity_date >= start && a.activity_date <= today)
        .map(|a| (a.activity_date, a.survey_views))
        .collect();

    let streak_data = (0..STREAK_DAYS)
        .map(|offset| {
            let date = start + Duration::days(offset);
            StreakDay {
                date,
                count: in_window.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    Streak {
        streak_data,
        total_days_active: in_window.len(),
    }
}
