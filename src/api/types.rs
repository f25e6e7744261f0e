//! API response and request types for the FPL REST API.

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Fixture, PlayerSnapshot, PlayerStatus, Position, SeasonStats, TransferCandidate,
    NEUTRAL_DIFFICULTY,
};

/// The API sends some decimals as strings (`"form": "5.0"`). Accept either,
/// mapping null or unparseable values to 0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => n,
        Some(Raw::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}

/// Response from /bootstrap-static/.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapStatic {
    #[serde(default)]
    pub events: Vec<EventResponse>,
    #[serde(default)]
    pub elements: Vec<ElementResponse>,
    #[serde(default)]
    pub teams: Vec<TeamResponse>,
}

impl BootstrapStatic {
    /// Gameweek flagged current, or else the one flagged next.
    pub fn current_gameweek(&self) -> Option<u32> {
        self.events
            .iter()
            .find(|e| e.is_current || e.is_next)
            .map(|e| e.id)
    }

    /// Gameweek transfers made now take effect in. `None` after the final
    /// gameweek.
    pub fn next_gameweek(&self) -> Option<u32> {
        if let Some(next) = self.events.iter().find(|e| e.is_next) {
            return Some(next.id);
        }
        let following = self.events.iter().find(|e| e.is_current)?.id + 1;
        self.events
            .iter()
            .any(|e| e.id == following)
            .then_some(following)
    }

    pub fn team_short_name(&self, team_id: u32) -> Option<&str> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|t| t.short_name.as_str())
    }

    pub fn element(&self, player_id: u32) -> Option<&ElementResponse> {
        self.elements.iter().find(|e| e.id == player_id)
    }

    /// All players as snapshots, skipping non-player element types.
    pub fn snapshots(&self) -> Vec<PlayerSnapshot> {
        self.elements.iter().filter_map(ElementResponse::to_snapshot).collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventResponse {
    pub id: u32,
    #[serde(default)]
    pub is_current: bool,
    #[serde(default)]
    pub is_next: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamResponse {
    pub id: u32,
    #[serde(default)]
    pub short_name: String,
}

/// Player entry in bootstrap `elements`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementResponse {
    pub id: u32,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team: u32,
    #[serde(default)]
    pub element_type: u8,
    #[serde(default)]
    pub now_cost: u32,
    pub status: Option<String>,
    pub news: Option<String>,
    pub chance_of_playing_next_round: Option<u8>,
    pub chance_of_playing_this_round: Option<u8>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub form: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points_per_game: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub selected_by_percent: f64,
    #[serde(default)]
    pub total_points: i32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub goals_scored: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub clean_sheets: u32,
    #[serde(default)]
    pub yellow_cards: u32,
    #[serde(default)]
    pub red_cards: u32,
    #[serde(default)]
    pub saves: u32,
    #[serde(default)]
    pub bonus: u32,
    #[serde(default)]
    pub bps: i32,
    #[serde(default)]
    pub transfers_in_event: i64,
    #[serde(default)]
    pub transfers_out_event: i64,
}

impl ElementResponse {
    pub fn to_snapshot(&self) -> Option<PlayerSnapshot> {
        let position = Position::from_element_type(self.element_type)?;

        Some(PlayerSnapshot {
            id: self.id,
            web_name: self.web_name.clone(),
            team: self.team,
            position,
            price: self.now_cost,
            status: self.status.as_deref().and_then(PlayerStatus::from_code),
            news: self.news.clone().unwrap_or_default(),
            chance_of_playing_next_round: self.chance_of_playing_next_round,
            chance_of_playing_this_round: self.chance_of_playing_this_round,
            form: self.form,
            stats: SeasonStats {
                total_points: self.total_points,
                minutes: self.minutes,
                goals_scored: self.goals_scored,
                assists: self.assists,
                clean_sheets: self.clean_sheets,
                yellow_cards: self.yellow_cards,
                red_cards: self.red_cards,
                saves: self.saves,
                bonus: self.bonus,
                bps: self.bps,
                points_per_game: self.points_per_game,
            },
            selected_by_percent: self.selected_by_percent,
            transfers_in: self.transfers_in_event,
            transfers_out: self.transfers_out_event,
        })
    }
}

/// Response from /element-summary/{id}/.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementSummary {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One past gameweek of a player.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    pub fixture: u32,
    pub total_points: i32,
    pub was_home: bool,
    pub minutes: u32,
    pub goals_scored: u32,
    pub assists: u32,
    pub clean_sheets: u32,
    pub yellow_cards: u32,
    pub red_cards: u32,
    pub saves: u32,
    pub bonus: u32,
    pub bps: i32,
    pub transfers_in: i64,
    pub transfers_out: i64,
}

/// Fixture from /fixtures/.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureResponse {
    pub id: u32,
    pub event: Option<u32>,
    #[serde(default)]
    pub team_h: u32,
    #[serde(default)]
    pub team_a: u32,
    pub team_h_difficulty: Option<u8>,
    pub team_a_difficulty: Option<u8>,
}

impl From<FixtureResponse> for Fixture {
    fn from(f: FixtureResponse) -> Self {
        Self {
            id: f.id,
            gameweek: f.event,
            team_h: f.team_h,
            team_a: f.team_a,
            team_h_difficulty: f.team_h_difficulty.unwrap_or(NEUTRAL_DIFFICULTY),
            team_a_difficulty: f.team_a_difficulty.unwrap_or(NEUTRAL_DIFFICULTY),
        }
    }
}

/// Response from /entry/{team_id}/.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryResponse {
    pub name: String,
}

/// Response from /entry/{team_id}/event/{gw}/picks/.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PicksResponse {
    #[serde(default)]
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub entry_history: EntryHistory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pick {
    pub element: u32,
    pub is_captain: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryHistory {
    /// Money in the bank, tenths of a million
    pub bank: i64,
    /// Squad value, tenths of a million
    pub value: i64,
}

/// Body of POST /transfers/.
#[derive(Debug, Clone, Serialize)]
pub struct TransferPayload {
    pub confirmed: bool,
    pub entry: u64,
    pub event: u32,
    pub wildcard: bool,
    pub freehit: bool,
    pub benchboost: bool,
    pub triple_captain: bool,
    pub transfers: Vec<TransferRequest>,
}

impl TransferPayload {
    /// Confirmed payload with every chip disabled.
    pub fn new(entry: u64, event: u32, transfers: Vec<TransferRequest>) -> Self {
        Self {
            confirmed: true,
            entry,
            event,
            wildcard: false,
            freehit: false,
            benchboost: false,
            triple_captain: false,
            transfers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    pub element_in: u32,
    pub element_out: u32,
    pub purchase_price: u32,
    pub selling_price: u32,
}

impl From<&TransferCandidate> for TransferRequest {
    fn from(c: &TransferCandidate) -> Self {
        Self {
            element_in: c.player_in.id,
            element_out: c.player_out.id,
            purchase_price: c.player_in.price,
            selling_price: c.player_out.price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_decodes_string_decimals() {
        let json = r#"{
            "id": 7, "web_name": "Saka", "team": 1, "element_type": 3,
            "now_cost": 100, "status": "d", "news": null,
            "chance_of_playing_next_round": 75,
            "form": "6.5", "points_per_game": "5.9", "selected_by_percent": "oops"
        }"#;
        let element: ElementResponse = serde_json::from_str(json).unwrap();
        assert_eq!(element.form, 6.5);
        assert_eq!(element.points_per_game, 5.9);
        assert_eq!(element.selected_by_percent, 0.0);

        let snapshot = element.to_snapshot().unwrap();
        assert_eq!(snapshot.position, Position::Midfielder);
        assert_eq!(snapshot.status, Some(PlayerStatus::Doubtful));
        assert_eq!(snapshot.chance_of_playing_this_round, None);
        assert_eq!(snapshot.news, "");
        assert_eq!(snapshot.price_millions(), 10.0);
    }

    #[test]
    fn test_non_player_elements_skipped() {
        let element = ElementResponse {
            id: 1,
            element_type: 5,
            ..Default::default()
        };
        assert!(element.to_snapshot().is_none());
    }

    #[test]
    fn test_gameweek_resolution() {
        let events = |flags: &[(u32, bool, bool)]| BootstrapStatic {
            events: flags
                .iter()
                .map(|&(id, is_current, is_next)| EventResponse {
                    id,
                    is_current,
                    is_next,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let mid_season = events(&[(1, false, false), (2, true, false), (3, false, true)]);
        assert_eq!(mid_season.current_gameweek(), Some(2));
        assert_eq!(mid_season.next_gameweek(), Some(3));

        let preseason = events(&[(1, false, true), (2, false, false)]);
        assert_eq!(preseason.current_gameweek(), Some(1));
        assert_eq!(preseason.next_gameweek(), Some(1));

        let between = events(&[(4, true, false), (5, false, false)]);
        assert_eq!(between.next_gameweek(), Some(5));

        let season_end = events(&[(37, false, false), (38, true, false)]);
        assert_eq!(season_end.current_gameweek(), Some(38));
        assert_eq!(season_end.next_gameweek(), None);

        assert_eq!(BootstrapStatic::default().current_gameweek(), None);
    }

    #[test]
    fn test_upstream_extras_are_ignored() {
        let picks: PicksResponse = serde_json::from_str(
            r#"{
                "active_chip": null,
                "entry_history": {"event": 5, "points": 61, "total_points": 300,
                                  "bank": 12, "value": 1003, "event_transfers": 1,
                                  "event_transfers_cost": 0},
                "picks": [{"element": 7, "position": 1, "multiplier": 2,
                           "is_captain": true, "is_vice_captain": false}]
            }"#,
        )
        .unwrap();
        assert_eq!(picks.entry_history.bank, 12);
        assert_eq!(picks.entry_history.value, 1003);
        assert_eq!(picks.picks[0].element, 7);
        assert!(picks.picks[0].is_captain);

        let entry: EntryResponse = serde_json::from_str(
            r#"{"id": 42, "name": "Route One", "player_first_name": "A",
                "summary_overall_rank": 1000}"#,
        )
        .unwrap();
        assert_eq!(entry.name, "Route One");

        let summary: ElementSummary = serde_json::from_str(
            r#"{"history": [{"element": 7, "fixture": 3, "opponent_team": 9, "round": 1,
                             "total_points": 6, "was_home": true, "value": 100,
                             "selected": 12345}]}"#,
        )
        .unwrap();
        assert_eq!(summary.history[0].fixture, 3);
        assert_eq!(summary.history[0].total_points, 6);
        assert!(summary.history[0].was_home);
    }

    #[test]
    fn test_fixture_defaults_difficulty() {
        let f: FixtureResponse =
            serde_json::from_str(r#"{"id": 1, "event": null, "team_h": 2, "team_a": 3}"#).unwrap();
        let fixture = Fixture::from(f);
        assert_eq!(fixture.gameweek, None);
        assert_eq!(fixture.team_h_difficulty, NEUTRAL_DIFFICULTY);
        assert_eq!(fixture.team_a_difficulty, NEUTRAL_DIFFICULTY);
    }

    #[test]
    fn test_payload_chips_disabled() {
        let payload = TransferPayload::new(42, 10, vec![]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["confirmed"], true);
        assert_eq!(json["entry"], 42);
        assert_eq!(json["wildcard"], false);
        assert_eq!(json["freehit"], false);
        assert_eq!(json["benchboost"], false);
        assert_eq!(json["triple_captain"], false);
        assert!(json["transfers"].as_array().unwrap().is_empty());
    }
}
