//! Daily session planning from declarative templates.
//!
//! [`plan_day`] decides which templates become session instances on a date.
//! It is pure: the caller passes the whole [`ScheduleConfig`] in and gets a
//! [`DayPlan`] back, which the storage layer then synchronizes.
//!
//! # Rules
//!
//! 1. A closed weekday plans nothing.
//! 2. Active templates are considered in ascending start order; ties keep
//!    configuration order.
//! 3. A template must fit the business hours (see [`MinuteSpan::admits`]),
//!    must not touch the lunch break unless it crosses midnight, and must not
//!    overlap a template accepted before it.
//! 4. Earlier templates win conflicts. Losers are reported as rejections,
//!    never as errors.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::clock::MinuteSpan;
use crate::types::ShortCode;

/// A recurring daily session definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTemplate {
    pub name: String,
    pub short_code: ShortCode,
    pub start_time: String,
    pub end_time: String,
    pub max_tokens: u32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl DayTemplate {
    pub fn span(&self) -> MinuteSpan {
        MinuteSpan::parse(&self.start_time, &self.end_time)
    }
}

const fn default_true() -> bool {
    true
}

/// Opening hours for one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyScheduleEntry {
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

impl Default for WeeklyScheduleEntry {
    fn default() -> Self {
        Self::closed()
    }
}

impl WeeklyScheduleEntry {
    pub fn open(start_time: &str, end_time: &str) -> Self {
        Self {
            is_open: true,
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    pub fn closed() -> Self {
        Self {
            is_open: false,
            start_time: "00:00".to_string(),
            end_time: "00:00".to_string(),
        }
    }

    pub fn span(&self) -> MinuteSpan {
        MinuteSpan::parse(&self.start_time, &self.end_time)
    }
}

/// Opening hours for every weekday. Days left out of the config are closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklySchedule {
    pub monday: WeeklyScheduleEntry,
    pub tuesday: WeeklyScheduleEntry,
    pub wednesday: WeeklyScheduleEntry,
    pub thursday: WeeklyScheduleEntry,
    pub friday: WeeklyScheduleEntry,
    pub saturday: WeeklyScheduleEntry,
    pub sunday: WeeklyScheduleEntry,
}

impl WeeklySchedule {
    /// The same hours on every day of the week.
    pub fn every_day(entry: &WeeklyScheduleEntry) -> Self {
        Self {
            monday: entry.clone(),
            tuesday: entry.clone(),
            wednesday: entry.clone(),
            thursday: entry.clone(),
            friday: entry.clone(),
            saturday: entry.clone(),
            sunday: entry.clone(),
        }
    }

    pub const fn entry(&self, weekday: Weekday) -> &WeeklyScheduleEntry {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }

    pub const fn entry_mut(&mut self, weekday: Weekday) -> &mut WeeklyScheduleEntry {
        match weekday {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        }
    }
}

/// A break applied to every open day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunchBreak {
    pub start: String,
    pub end: String,
}

impl LunchBreak {
    pub fn span(&self) -> MinuteSpan {
        MinuteSpan::parse(&self.start, &self.end)
    }
}

/// Everything the planner needs to know about the schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub weekly: WeeklySchedule,
    pub lunch_break: Option<LunchBreak>,
    pub templates: Vec<DayTemplate>,
}

/// A template accepted for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSession {
    pub name: String,
    pub short_code: ShortCode,
    pub span: MinuteSpan,
    pub max_tokens: u32,
}

/// Why a template was left out of a day's plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The template is switched off.
    Inactive,
    /// Another template earlier in the day already uses the short code.
    DuplicateShortCode,
    /// The template crosses midnight but the business day does not.
    UnsupportedMidnightCrossing,
    /// The template starts or ends outside opening hours.
    OutsideBusinessHours,
    /// The template intersects the lunch break.
    LunchBreak,
    /// The template overlaps an earlier accepted template.
    Overlaps { short_code: ShortCode },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::DuplicateShortCode => write!(f, "duplicate short code"),
            Self::UnsupportedMidnightCrossing => {
                write!(f, "crosses midnight but business hours do not")
            }
            Self::OutsideBusinessHours => write!(f, "outside business hours"),
            Self::LunchBreak => write!(f, "intersects lunch break"),
            Self::Overlaps { short_code } => write!(f, "overlaps {short_code}"),
        }
    }
}

/// A template left out of a day's plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub short_code: ShortCode,
    pub span: MinuteSpan,
    pub reason: RejectReason,
}

/// The outcome of planning one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// Business hours, or `None` when the weekday is closed.
    pub business_hours: Option<MinuteSpan>,
    /// Accepted sessions in ascending start order.
    pub accepted: Vec<PlannedSession>,
    pub rejected: Vec<Rejection>,
}

impl DayPlan {
    pub const fn is_open(&self) -> bool {
        self.business_hours.is_some()
    }
}

/// Plans the sessions for `date`.
pub fn plan_day(date: NaiveDate, config: &ScheduleConfig) -> DayPlan {
    let entry = config.weekly.entry(date.weekday());
    if !entry.is_open {
        return DayPlan {
            date,
            business_hours: None,
            accepted: Vec::new(),
            rejected: Vec::new(),
        };
    }

    let business = entry.span();
    let lunch = config.lunch_break.as_ref().map(LunchBreak::span);

    let mut templates: Vec<(&DayTemplate, MinuteSpan)> = config
        .templates
        .iter()
        .map(|template| (template, template.span()))
        .collect();
    templates.sort_by_key(|(_, span)| span.start());

    let mut accepted: Vec<PlannedSession> = Vec::new();
    let mut rejected = Vec::new();
    let mut seen_codes: HashSet<&ShortCode> = HashSet::new();

    for (template, span) in templates {
        let verdict = if !template.is_active {
            Err(RejectReason::Inactive)
        } else if seen_codes.contains(&template.short_code) {
            Err(RejectReason::DuplicateShortCode)
        } else {
            check_template(business, lunch, span, &accepted)
        };

        match verdict {
            Ok(()) => {
                seen_codes.insert(&template.short_code);
                accepted.push(PlannedSession {
                    name: template.name.clone(),
                    short_code: template.short_code.clone(),
                    span,
                    max_tokens: template.max_tokens,
                });
            }
            Err(reason) => rejected.push(Rejection {
                name: template.name.clone(),
                short_code: template.short_code.clone(),
                span,
                reason,
            }),
        }
    }

    DayPlan {
        date,
        business_hours: Some(business),
        accepted,
        rejected,
    }
}

fn check_template(
    business: MinuteSpan,
    lunch: Option<MinuteSpan>,
    span: MinuteSpan,
    accepted: &[PlannedSession],
) -> Result<(), RejectReason> {
    if !business.admits(span) {
        return Err(if span.crosses_midnight() && !business.crosses_midnight() {
            RejectReason::UnsupportedMidnightCrossing
        } else {
            RejectReason::OutsideBusinessHours
        });
    }

    if !span.crosses_midnight() && lunch.is_some_and(|lunch| lunch.overlaps(span)) {
        return Err(RejectReason::LunchBreak);
    }

    if let Some(existing) = accepted.iter().find(|planned| planned.span.overlaps(span)) {
        return Err(RejectReason::Overlaps {
            short_code: existing.short_code.clone(),
        });
    }

    Ok(())
}
