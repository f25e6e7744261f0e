//! Transfer engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables for transfer selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Maximum transfers made in one cycle
    pub max_transfers: usize,

    /// Transfers available without a point penalty
    pub free_transfers: usize,

    /// Point penalty per transfer beyond the free allowance
    pub transfer_cost: u32,

    /// Money kept in the bank, tenths of a million
    pub budget_buffer: u32,

    /// Minimum chance of playing next round for an incoming player (percent)
    pub min_chance_of_playing: u8,

    /// Non-squad players per position whose history is fetched
    pub shortlist_per_position: usize,

    /// Maximum players from one club
    pub max_per_club: usize,

    /// Train the predictor from fetched histories when it is untrained
    pub train_predictor: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_transfers: 2,
            free_transfers: 1,
            transfer_cost: 4,
            budget_buffer: 5,          // 0.5m
            min_chance_of_playing: 75,
            shortlist_per_position: 10,
            max_per_club: 3,           // game rule
            train_predictor: true,
        }
    }
}

impl TransferConfig {
    /// Point penalty of the transfer at `index` (0-based) within a cycle.
    pub fn cost_of(&self, index: usize) -> u32 {
        if index < self.free_transfers {
            0
        } else {
            self.transfer_cost
        }
    }
}
