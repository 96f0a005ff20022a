//! Minute-of-day arithmetic with midnight normalization.
//!
//! Every time comparison in the scheduler goes through [`MinuteSpan`]. Clock
//! times are minutes since the start of the day (`0..1440`); a span whose end
//! is at or before its start wraps past midnight and is normalized by adding
//! [`MINUTES_PER_DAY`] to its end, so normalized ends may exceed 1440.

use std::fmt;

use chrono::{NaiveTime, Timelike};

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Parses `HH:MM` or `HH:MM:SS` into minutes since midnight.
///
/// Malformed input yields `0`. Templates with broken times are then excluded
/// by validation rather than aborting the whole day.
pub fn parse_minutes(value: &str) -> u32 {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map(|time| time.hour() * 60 + time.minute())
        .unwrap_or(0)
}

/// Formats minutes as `HH:MM`, folding values past midnight back into the day.
pub fn format_minutes(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// A normalized half-open interval `[start, end)` in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MinuteSpan {
    start: u32,
    end: u32,
}

impl MinuteSpan {
    /// Builds a span from two clock minutes, wrapping when `end <= start`.
    pub const fn from_clock(start: u32, end: u32) -> Self {
        let start = start % MINUTES_PER_DAY;
        let end = end % MINUTES_PER_DAY;
        if end <= start {
            Self {
                start,
                end: end + MINUTES_PER_DAY,
            }
        } else {
            Self { start, end }
        }
    }

    /// Parses both ends with [`parse_minutes`].
    pub fn parse(start: &str, end: &str) -> Self {
        Self::from_clock(parse_minutes(start), parse_minutes(end))
    }

    pub const fn start(self) -> u32 {
        self.start
    }

    /// Normalized end; greater than [`MINUTES_PER_DAY`] for wrapping spans.
    pub const fn end(self) -> u32 {
        self.end
    }

    /// Clock end in `0..1440`, as stored.
    pub const fn clock_end(self) -> u32 {
        self.end % MINUTES_PER_DAY
    }

    /// Whether the clock end is at or before the start. Only wrapped spans
    /// reach [`MINUTES_PER_DAY`], so a span ending at `00:00` counts.
    pub const fn crosses_midnight(self) -> bool {
        self.end >= MINUTES_PER_DAY
    }

    /// Half-open intersection test: `max(starts) < min(ends)`.
    pub fn overlaps(self, other: Self) -> bool {
        self.start.max(other.start) < self.end.min(other.end)
    }

    /// Whether `other` lies entirely inside `self`.
    pub const fn contains(self, other: Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Whether a template span fits inside these business hours.
    ///
    /// A crossing business day accepts a non-crossing template only when it
    /// sits wholly before midnight or wholly after it. A crossing template is
    /// never accepted on a business day that closes before midnight.
    pub const fn admits(self, template: Self) -> bool {
        match (self.crosses_midnight(), template.crosses_midnight()) {
            (false, false) | (true, true) => self.contains(template),
            (false, true) => false,
            (true, false) => {
                let before_midnight =
                    template.start >= self.start && template.end <= MINUTES_PER_DAY;
                let after_midnight = template.end <= self.end - MINUTES_PER_DAY;
                before_midnight || after_midnight
            }
        }
    }
}

impl fmt::Display for MinuteSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            format_minutes(self.start),
            format_minutes(self.end)
        )
    }
}
