//! Debate sides and transcript speakers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two debate positions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Arguing in favor of the topic.
    Pro,
    /// Arguing against the topic.
    Con,
}

impl Side {
    /// The opposing side.
    pub fn complement(self) -> Side {
        match self {
            Side::Pro => Side::Con,
            Side::Con => Side::Pro,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Side::Pro => "Pro",
            Side::Con => "Con",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Who a transcript turn is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Speaker {
    /// The seed instructions for the completion service.
    System,
    /// The student.
    User,
    /// The completion service arguing the other side.
    Bot,
}

impl Speaker {
    pub fn display_name(&self) -> &'static str {
        match self {
            Speaker::System => "SYSTEM",
            Speaker::User => "YOU",
            Speaker::Bot => "BOT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement_is_involution() {
        for side in [Side::Pro, Side::Con] {
            assert_ne!(side, side.complement());
            assert_eq!(side, side.complement().complement());
        }
    }

    #[test]
    fn test_side_deserializes_lowercase() {
        let side: Side = serde_json::from_str("\"con\"").unwrap();
        assert_eq!(side, Side::Con);
        assert_eq!(side.to_string(), "Con");
    }
}
