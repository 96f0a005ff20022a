//! Queue token formatting.

use serde::{Deserialize, Serialize};

use crate::types::ShortCode;

/// Minimum width of the zero-padded sequence part.
const SEQUENCE_WIDTH: usize = 3;

/// Token layout: `{prefix}{short_code}{sequence:03}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFormat {
    pub prefix: String,
}

impl Default for TokenFormat {
    fn default() -> Self {
        Self {
            prefix: "T-".to_string(),
        }
    }
}

impl TokenFormat {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Renders the token for the given sequence number.
    ///
    /// Sequences above 999 keep all their digits.
    pub fn render(&self, short_code: &ShortCode, sequence: u32) -> String {
        format!(
            "{}{}{:0width$}",
            self.prefix,
            short_code,
            sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

/// Sequence that follows the highest one already issued.
pub fn next_sequence(highest: Option<u32>) -> u32 {
    highest.map_or(1, |n| n + 1)
}
