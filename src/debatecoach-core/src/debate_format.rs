//! The fixed six-round debate format.
//!
//! Rounds are identified by number, never by their display text, so the
//! titles sent to the completion service and the branching on whose turn it
//! is cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::participant::Side;

/// Number of content rounds in a debate.
pub const ROUND_COUNT: u8 = 6;

/// One of the six debate stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Round {
    ProOpening,
    ConOpening,
    ProRebuttal,
    ConRebuttal,
    ProClosing,
    ConClosing,
}

impl Round {
    /// All rounds in speaking order.
    pub const ALL: [Round; ROUND_COUNT as usize] = [
        Round::ProOpening,
        Round::ConOpening,
        Round::ProRebuttal,
        Round::ConRebuttal,
        Round::ProClosing,
        Round::ConClosing,
    ];

    /// Look up a round by its 1-based number.
    pub fn from_number(number: u8) -> Option<Round> {
        match number {
            1..=ROUND_COUNT => Some(Self::ALL[(number - 1) as usize]),
            _ => None,
        }
    }

    /// 1-based position of this round.
    pub fn number(self) -> u8 {
        match self {
            Round::ProOpening => 1,
            Round::ConOpening => 2,
            Round::ProRebuttal => 3,
            Round::ConRebuttal => 4,
            Round::ProClosing => 5,
            Round::ConClosing => 6,
        }
    }

    /// Title announced to both debaters.
    pub fn title(self) -> &'static str {
        match self {
            Round::ProOpening => "Pro Opening",
            Round::ConOpening => "Con Opening",
            Round::ProRebuttal => "Pro Rebuttal",
            Round::ConRebuttal => "Con Rebuttal",
            Round::ProClosing => "Pro Closing",
            Round::ConClosing => "Con Closing",
        }
    }

    /// The side that speaks in this round, regardless of who holds it.
    pub fn scheduled_side(self) -> Side {
        scheduled_side(self.number())
    }

    /// The round after this one, if any.
    pub fn next(self) -> Option<Round> {
        Round::from_number(self.number() + 1)
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Pro speaks in odd rounds and Con in even ones.
pub fn scheduled_side(round: u8) -> Side {
    if round % 2 == 1 { Side::Pro } else { Side::Con }
}

/// Numbered agenda listing every round, one per line.
pub fn agenda() -> String {
    Round::ALL
        .iter()
        .map(|round| format!("{}. {}", round.number(), round.title()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_sides_alternate() {
        let sides: Vec<Side> = Round::ALL.iter().map(|r| r.scheduled_side()).collect();
        assert_eq!(
            sides,
            vec![Side::Pro, Side::Con, Side::Pro, Side::Con, Side::Pro, Side::Con]
        );
    }

    #[test]
    fn test_round_numbers_round_trip() {
        for (i, round) in Round::ALL.iter().enumerate() {
            assert_eq!(round.number() as usize, i + 1);
            assert_eq!(Round::from_number(round.number()), Some(*round));
        }
        assert_eq!(Round::from_number(0), None);
        assert_eq!(Round::from_number(7), None);
    }

    #[test]
    fn test_title_matches_scheduled_side() {
        for round in Round::ALL {
            assert!(round.title().starts_with(round.scheduled_side().display_name()));
        }
    }

    #[test]
    fn test_next_round() {
        assert_eq!(Round::ProOpening.next(), Some(Round::ConOpening));
        assert_eq!(Round::ConClosing.next(), None);
    }

    #[test]
    fn test_agenda_lists_all_rounds() {
        let agenda = agenda();
        assert_eq!(agenda.lines().count(), 6);
        assert!(agenda.starts_with("1. Pro Opening"));
        assert!(agenda.ends_with("6. Con Closing"));
    }
}
