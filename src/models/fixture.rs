//! Fixture model and difficulty lookup.

use serde::{Deserialize, Serialize};

/// Difficulty used whenever no fixture matches.
pub const NEUTRAL_DIFFICULTY: u8 = 3;

/// A scheduled match between two clubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u32,
    /// Gameweek; `None` while a postponed fixture is unscheduled
    pub gameweek: Option<u32>,
    pub team_h: u32,
    pub team_a: u32,
    /// Ordinal 1 (easy) to 5 (hard), from the home side's perspective
    pub team_h_difficulty: u8,
    pub team_a_difficulty: u8,
}

/// Difficulty of `team_id`'s fixture in `gameweek`.
///
/// Uses the first matching fixture in a double gameweek and falls back to
/// [`NEUTRAL_DIFFICULTY`] when the team does not play.
pub fn fixture_difficulty(fixtures: &[Fixture], team_id: u32, gameweek: u32) -> u8 {
    fixtures
        .iter()
        .filter(|f| f.gameweek == Some(gameweek))
        .find_map(|f| {
            if f.team_h == team_id {
                Some(f.team_h_difficulty)
            } else if f.team_a == team_id {
                Some(f.team_a_difficulty)
            } else {
                None
            }
        })
        .unwrap_or(NEUTRAL_DIFFICULTY)
}
