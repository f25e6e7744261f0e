//! Expected-points prediction.
//!
//! The engine only sees the [`Predictor`] trait; [`LinearPredictor`] is the
//! implementation the bot ships with.

mod linear;

pub use linear::LinearPredictor;

use crate::api::HistoryEntry;
use crate::models::PlayerSnapshot;

pub const FEATURE_COUNT: usize = 15;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "opponent_difficulty",
    "minutes",
    "goals_scored",
    "assists",
    "clean_sheet",
    "yellow_cards",
    "red_cards",
    "saves",
    "bonus",
    "bps",
    "form",
    "points_per_game",
    "selected_by_percent",
    "transfers_in",
    "transfers_out",
];

/// Capability the engine needs from a model.
pub trait Predictor {
    fn is_trained(&self) -> bool;

    /// Expected points. May be non-finite; callers must check.
    fn predict(&self, features: &PlayerFeatures) -> f64;

    /// Fit on `samples`. Returns whether the model is now usable.
    fn train(&mut self, samples: &[TrainingSample]) -> bool;
}

/// Model input for one player and one fixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerFeatures {
    pub opponent_difficulty: f64,
    pub minutes: f64,
    pub goals_scored: f64,
    pub assists: f64,
    /// 1.0 when a clean sheet was kept
    pub clean_sheet: f64,
    pub yellow_cards: f64,
    pub red_cards: f64,
    pub saves: f64,
    pub bonus: f64,
    pub bps: f64,
    pub form: f64,
    pub points_per_game: f64,
    pub selected_by_percent: f64,
    pub transfers_in: f64,
    pub transfers_out: f64,
}

impl PlayerFeatures {
    /// Features from season totals, used when no per-gameweek history exists.
    pub fn from_snapshot(player: &PlayerSnapshot, difficulty: u8) -> Self {
        let stats = &player.stats;
        Self {
            opponent_difficulty: f64::from(difficulty),
            minutes: f64::from(stats.minutes),
            goals_scored: f64::from(stats.goals_scored),
            assists: f64::from(stats.assists),
            clean_sheet: if stats.clean_sheets > 0 { 1.0 } else { 0.0 },
            yellow_cards: f64::from(stats.yellow_cards),
            red_cards: f64::from(stats.red_cards),
            saves: f64::from(stats.saves),
            bonus: f64::from(stats.bonus),
            bps: f64::from(stats.bps),
            form: player.form,
            points_per_game: stats.points_per_game,
            selected_by_percent: player.selected_by_percent,
            transfers_in: player.transfers_in as f64,
            transfers_out: player.transfers_out as f64,
        }
    }

    /// Features from one past gameweek, facing a fixture of `difficulty`.
    pub fn from_history(entry: &HistoryEntry, player: &PlayerSnapshot, difficulty: u8) -> Self {
        Self {
            opponent_difficulty: f64::from(difficulty),
            minutes: f64::from(entry.minutes),
            goals_scored: f64::from(entry.goals_scored),
            assists: f64::from(entry.assists),
            clean_sheet: if entry.clean_sheets > 0 { 1.0 } else { 0.0 },
            yellow_cards: f64::from(entry.yellow_cards),
            red_cards: f64::from(entry.red_cards),
            saves: f64::from(entry.saves),
            bonus: f64::from(entry.bonus),
            bps: f64::from(entry.bps),
            form: player.form,
            points_per_game: player.stats.points_per_game,
            selected_by_percent: player.selected_by_percent,
            transfers_in: entry.transfers_in as f64,
            transfers_out: entry.transfers_out as f64,
        }
    }

    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.opponent_difficulty,
            self.minutes,
            self.goals_scored,
            self.assists,
            self.clean_sheet,
            self.yellow_cards,
            self.red_cards,
            self.saves,
            self.bonus,
            self.bps,
            self.form,
            self.points_per_game,
            self.selected_by_percent,
            self.transfers_in,
            self.transfers_out,
        ]
    }
}

/// Features paired with the points actually scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: PlayerFeatures,
    pub points: f64,
}

/// Turn a player's history into samples: each gameweek's stats predict the
/// points of the following gameweek.
pub fn training_samples<F>(
    player: &PlayerSnapshot,
    history: &[HistoryEntry],
    difficulty_of: F,
) -> Vec<TrainingSample>
where
    F: Fn(&HistoryEntry) -> u8,
{
    history
        .windows(2)
        .map(|pair| TrainingSample {
            features: PlayerFeatures::from_history(&pair[0], player, difficulty_of(&pair[1])),
            points: f64::from(pair[1].total_points),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, SeasonStats};

    fn player() -> PlayerSnapshot {
        PlayerSnapshot {
            id: 1,
            web_name: "Test".to_string(),
            team: 1,
            position: Position::Midfielder,
            price: 80,
            status: None,
            news: String::new(),
            chance_of_playing_next_round: None,
            chance_of_playing_this_round: None,
            form: 5.5,
            stats: SeasonStats {
                minutes: 900,
                clean_sheets: 0,
                goals_scored: 4,
                points_per_game: 5.1,
                ..Default::default()
            },
            selected_by_percent: 12.5,
            transfers_in: 1000,
            transfers_out: 250,
        }
    }

    #[test]
    fn test_vector_order_matches_names() {
        let features = PlayerFeatures::from_snapshot(&player(), 4);
        let vector = features.to_vector();

        let at = |name: &str| vector[FEATURE_NAMES.iter().position(|n| *n == name).unwrap()];
        assert_eq!(at("opponent_difficulty"), 4.0);
        assert_eq!(at("minutes"), 900.0);
        assert_eq!(at("goals_scored"), 4.0);
        assert_eq!(at("clean_sheet"), 0.0);
        assert_eq!(at("form"), 5.5);
        assert_eq!(at("transfers_out"), 250.0);
    }

    #[test]
    fn test_samples_pair_stats_with_next_points() {
        let history: Vec<HistoryEntry> = [(90, 1, 8), (45, 0, 2), (90, 0, 6)]
            .iter()
            .map(|&(minutes, goals, points)| HistoryEntry {
                minutes,
                goals_scored: goals,
                total_points: points,
                clean_sheets: 1,
                ..Default::default()
            })
            .collect();

        let samples = training_samples(&player(), &history, |_| 2);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].features.minutes, 90.0);
        assert_eq!(samples[0].features.goals_scored, 1.0);
        assert_eq!(samples[0].features.clean_sheet, 1.0);
        assert_eq!(samples[0].features.opponent_difficulty, 2.0);
        assert_eq!(samples[0].points, 2.0);
        assert_eq!(samples[1].points, 6.0);

        assert!(training_samples(&player(), &history[..1], |_| 3).is_empty());
    }
}
