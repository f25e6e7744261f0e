//! Data models for players, fixtures, and transfers.

mod fixture;
mod player;
mod transfer;

pub use fixture::{fixture_difficulty, Fixture, NEUTRAL_DIFFICULTY};
pub use player::{InjuryStatus, PlayerSnapshot, PlayerStatus, Position, SeasonStats};
pub use transfer::{TransferCandidate, TransferRecord};
