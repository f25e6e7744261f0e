//! Transfer models: transient candidates and durable records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::player::PlayerSnapshot;

/// A proposed swap built during selection. Never persisted directly.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCandidate {
    pub player_out: PlayerSnapshot,
    pub player_in: PlayerSnapshot,

    /// Value (points per million) of each side at selection time
    pub value_out: f64,
    pub value_in: f64,

    /// Net value gain after the amortized transfer cost
    pub projected_gain: f64,

    /// Point penalty: 0 for a free transfer, the configured cost otherwise
    pub cost: u32,

    /// Gameweek the transfer takes effect
    pub gameweek: u32,
}

impl TransferCandidate {
    pub fn is_free(&self) -> bool {
        self.cost == 0
    }

    /// Change in bank balance (tenths) if executed.
    pub fn bank_delta(&self) -> i64 {
        i64::from(self.player_out.price) - i64::from(self.player_in.price)
    }
}

/// Durable outcome of an executed transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRecord {
    pub id: String,
    pub gameweek: i64,
    pub player_out_id: i64,
    pub player_out_name: String,
    pub player_in_id: i64,
    pub player_in_name: String,
    pub projected_gain: f64,
    pub cost: i64,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Create the record for a candidate that was executed remotely.
    pub fn from_candidate(candidate: &TransferCandidate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            gameweek: i64::from(candidate.gameweek),
            player_out_id: i64::from(candidate.player_out.id),
            player_out_name: candidate.player_out.web_name.clone(),
            player_in_id: i64::from(candidate.player_in.id),
            player_in_name: candidate.player_in.web_name.clone(),
            projected_gain: candidate.projected_gain,
            cost: i64::from(candidate.cost),
            created_at: Utc::now(),
        }
    }
}
