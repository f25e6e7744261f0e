//! Player model: a per-cycle snapshot of one FPL element.

use serde::{Deserialize, Serialize};

/// Availability status code reported by the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Available,
    Doubtful,
    Injured,
    Suspended,
    Unavailable,
}

impl PlayerStatus {
    /// Parse the single-letter code used by the API (`a`, `d`, `i`, `s`, `u`, `n`).
    ///
    /// Unknown codes yield `None` and are treated like an absent status.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Self::Available),
            "d" => Some(Self::Doubtful),
            "i" => Some(Self::Injured),
            "s" => Some(Self::Suspended),
            // `n` marks players no longer at the club (loans, transfers abroad)
            "u" | "n" => Some(Self::Unavailable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Doubtful => "doubtful",
            Self::Injured => "injured",
            Self::Suspended => "suspended",
            Self::Unavailable => "unavailable",
        }
    }

    /// Statuses that rule a player out regardless of chance of playing.
    pub fn rules_out(&self) -> bool {
        matches!(self, Self::Injured | Self::Suspended | Self::Unavailable)
    }
}

/// Squad position (the API's `element_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub fn from_element_type(element_type: u8) -> Option<Self> {
        match element_type {
            1 => Some(Self::Goalkeeper),
            2 => Some(Self::Defender),
            3 => Some(Self::Midfielder),
            4 => Some(Self::Forward),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Goalkeeper => "GKP",
            Self::Defender => "DEF",
            Self::Midfielder => "MID",
            Self::Forward => "FWD",
        }
    }
}

/// Season-to-date totals and averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub total_points: i32,
    pub minutes: u32,
    pub goals_scored: u32,
    pub assists: u32,
    pub clean_sheets: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub saves: u32,
    pub bonus: u32,
    pub bps: i32,
    pub points_per_game: f64,
}

/// Immutable snapshot of a player fetched for one decision cycle.
///
/// Optional fields carry their default rule in the accessor that reads them:
/// an absent status means available, an absent chance of playing means the
/// player is expected to play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub web_name: String,
    /// Club id
    pub team: u32,
    pub position: Position,
    /// Price in tenths of a million (55 = 5.5m)
    pub price: u32,
    pub status: Option<PlayerStatus>,
    #[serde(default)]
    pub news: String,
    pub chance_of_playing_next_round: Option<u8>,
    pub chance_of_playing_this_round: Option<u8>,
    /// Recent form (points per game over the last 30 days)
    pub form: f64,
    pub stats: SeasonStats,
    pub selected_by_percent: f64,
    /// Transfers in/out during the current gameweek
    pub transfers_in: i64,
    pub transfers_out: i64,
}

impl PlayerSnapshot {
    /// Price in millions.
    pub fn price_millions(&self) -> f64 {
        f64::from(self.price) / 10.0
    }

    pub fn status_or_default(&self) -> PlayerStatus {
        self.status.unwrap_or(PlayerStatus::Available)
    }

    pub fn net_transfers(&self) -> i64 {
        self.transfers_in - self.transfers_out
    }
}

/// Injury/availability report for a single player with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjuryStatus {
    pub status: PlayerStatus,
    pub news: String,
    pub chance_of_playing_next_round: u8,
    pub chance_of_playing_this_round: u8,
}

impl Default for InjuryStatus {
    fn default() -> Self {
        Self {
            status: PlayerStatus::Available,
            news: String::new(),
            chance_of_playing_next_round: 100,
            chance_of_playing_this_round: 100,
        }
    }
}

impl From<&PlayerSnapshot> for InjuryStatus {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            status: player.status_or_default(),
            news: player.news.clone(),
            chance_of_playing_next_round: player.chance_of_playing_next_round.unwrap_or(100),
            chance_of_playing_this_round: player.chance_of_playing_this_round.unwrap_or(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PlayerStatus::from_code("a"), Some(PlayerStatus::Available));
        assert_eq!(PlayerStatus::from_code("i"), Some(PlayerStatus::Injured));
        assert_eq!(PlayerStatus::from_code("n"), Some(PlayerStatus::Unavailable));
        assert_eq!(PlayerStatus::from_code("x"), None);

        assert!(PlayerStatus::Suspended.rules_out());
        assert!(!PlayerStatus::Doubtful.rules_out());
    }

    #[test]
    fn test_injury_status_defaults() {
        let status = InjuryStatus::default();
        assert_eq!(status.status, PlayerStatus::Available);
        assert_eq!(status.chance_of_playing_next_round, 100);
        assert_eq!(status.chance_of_playing_this_round, 100);
        assert!(status.news.is_empty());
    }
}
