//! Core domain logic for session queues.
//!
//! This crate contains the storage-free parts of the scheduler:
//! - Clock arithmetic: minute-of-day spans normalized across midnight
//! - Schedule planning: which templates become sessions on a date
//! - Tokens and priorities: queue token layout and booking precedence

pub mod clock;
mod priority;
pub mod schedule;
mod token;
mod types;

pub use clock::{MINUTES_PER_DAY, MinuteSpan, format_minutes, parse_minutes};
pub use priority::Priority;
pub use schedule::{
    DayPlan, DayTemplate, LunchBreak, PlannedSession, RejectReason, Rejection, ScheduleConfig,
    WeeklySchedule, WeeklyScheduleEntry, plan_day,
};
pub use token::{TokenFormat, next_sequence};
pub use types::{BookingStatus, ResourceId, ShortCode, SubjectId, ValidationError};
