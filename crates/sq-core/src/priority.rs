//! Booking priority with a fixed precedence order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::ValidationError;

/// Queue priority of a booking.
///
/// Precedence is `Emergency > High > Normal > Low`; the derived [`Ord`]
/// follows declaration order, so `max` picks the more urgent value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

impl Priority {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }

    /// Combines a requested priority with a derived urgency.
    ///
    /// The result is never lower than either input, and defaults to
    /// [`Priority::Normal`] when neither is given.
    pub fn escalate(requested: Option<Self>, derived: Option<Self>) -> Self {
        match (requested, derived) {
            (Some(a), Some(b)) => a.max(b),
            (Some(p), None) | (None, Some(p)) => p,
            (None, None) => Self::default(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "emergency" => Ok(Self::Emergency),
            _ => Err(ValidationError::InvalidPriority {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order() {
        assert!(Priority::Emergency > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn escalate_only_raises() {
        assert_eq!(
            Priority::escalate(Some(Priority::Low), Some(Priority::High)),
            Priority::High
        );
        assert_eq!(
            Priority::escalate(Some(Priority::Emergency), Some(Priority::Normal)),
            Priority::Emergency
        );
        assert_eq!(Priority::escalate(Some(Priority::Low), None), Priority::Low);
        assert_eq!(Priority::escalate(None, Some(Priority::High)), Priority::High);
        assert_eq!(Priority::escalate(None, None), Priority::Normal);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("EMERGENCY".parse::<Priority>().unwrap(), Priority::Emergency);
        assert_eq!(" high ".parse::<Priority>().unwrap(), Priority::High);
    }

    #[test]
    fn unknown_priority_errors() {
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(err.to_string().contains("invalid priority: urgent"));
    }
}
