//! FPL REST API client.

mod auth;
mod client;
mod error;
mod pool;
mod retry;
#[cfg(test)]
pub(crate) mod stub;
mod types;

pub use auth::Credentials;
pub use client::{ApiConfig, FplClient, DEFAULT_TIMEOUT, FPL_BASE_URL};
pub use retry::RetryPolicy;
pub use types::*;
