//! Bot configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::api::{ApiConfig, Credentials, RetryPolicy, DEFAULT_TIMEOUT, FPL_BASE_URL};
use crate::engine::TransferConfig;

/// Everything the bot needs, split per component.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api: ApiConfig,
    pub transfers: TransferConfig,
}

impl BotConfig {
    /// Create from environment variables:
    /// - FPL_TEAM_ID
    /// - FPL_SESSION_ID and FPL_CSRF_TOKEN (preferred), or FPL_USERNAME and FPL_PASSWORD
    /// - FPL_BASE_URL
    /// - FPL_MAX_TRANSFERS (defaults to 2)
    /// - FPL_FREE_TRANSFERS (defaults to 1)
    /// - FPL_TRANSFER_COST (defaults to 4)
    /// - FPL_BUDGET_BUFFER in tenths of a million (defaults to 5)
    /// - FPL_RETRY_BASE_MS (defaults to 1000)
    /// - FPL_MAX_RATE_LIMIT_RETRIES (unset means uncapped)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = TransferConfig::default();

        let transfers = TransferConfig {
            max_transfers: parse_or(&var, "FPL_MAX_TRANSFERS", defaults.max_transfers)?,
            free_transfers: parse_or(&var, "FPL_FREE_TRANSFERS", defaults.free_transfers)?,
            transfer_cost: parse_or(&var, "FPL_TRANSFER_COST", defaults.transfer_cost)?,
            budget_buffer: parse_or(&var, "FPL_BUDGET_BUFFER", defaults.budget_buffer)?,
            ..defaults
        };

        let base_ms: u64 = parse_or(&var, "FPL_RETRY_BASE_MS", 1000)?;
        let retry = RetryPolicy {
            base_delay: Duration::from_millis(base_ms),
            max_rate_limit_retries: parse_opt(&var, "FPL_MAX_RATE_LIMIT_RETRIES")?,
            ..Default::default()
        };

        let credentials = Credentials::resolve(
            var("FPL_SESSION_ID"),
            var("FPL_CSRF_TOKEN"),
            var("FPL_USERNAME"),
            var("FPL_PASSWORD"),
        );

        let api = ApiConfig {
            base_url: var("FPL_BASE_URL").unwrap_or_else(|| FPL_BASE_URL.to_string()),
            team_id: parse_opt(&var, "FPL_TEAM_ID")?,
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retry,
        };

        Ok(Self { api, transfers })
    }
}

fn parse_opt<F, T>(var: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}
