//! Transfer decision engine.

mod config;
mod transfer_engine;

pub use config::TransferConfig;
pub use transfer_engine::{CycleReport, TransferEngine};
