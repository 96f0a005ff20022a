//! Fixtures shared by the storage tests.

use chrono::NaiveDate;
use sq_core::{DayTemplate, ScheduleConfig, ShortCode, WeeklySchedule, WeeklyScheduleEntry};

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid test date")
}

pub fn template(name: &str, code: &str, start: &str, end: &str, max_tokens: u32) -> DayTemplate {
    DayTemplate {
        name: name.to_string(),
        short_code: ShortCode::new(code).expect("valid short code"),
        start_time: start.to_string(),
        end_time: end.to_string(),
        max_tokens,
        is_active: true,
    }
}

/// Open every day with the given hours and no lunch break.
pub fn schedule(start: &str, end: &str, templates: Vec<DayTemplate>) -> ScheduleConfig {
    ScheduleConfig {
        weekly: WeeklySchedule::every_day(&WeeklyScheduleEntry::open(start, end)),
        lunch_break: None,
        templates,
    }
}
