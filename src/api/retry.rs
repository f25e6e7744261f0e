//! Retry bookkeeping shared by every request the client issues.
//!
//! One logical request gets `max_attempts` tries. The delay starts at
//! `base_delay` and doubles after each wait. A 429 waits twice the current
//! delay and does not use up an attempt; unless `max_rate_limit_retries` is
//! set, sustained rate limiting keeps the request retrying.

use std::time::Duration;

use reqwest::{Method, StatusCode};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry tunables for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap on 429 retries per request; `None` leaves them uncapped
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_rate_limit_retries: None,
        }
    }
}

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Success,
    RateLimited,
    /// 401 on a write: re-authenticate and replay once
    Reauthenticate,
    Retry,
}

pub fn classify(status: StatusCode, method: &Method) -> Disposition {
    match status {
        StatusCode::OK => Disposition::Success,
        StatusCode::TOO_MANY_REQUESTS => Disposition::RateLimited,
        StatusCode::UNAUTHORIZED if *method == Method::POST => Disposition::Reauthenticate,
        _ => Disposition::Retry,
    }
}

/// Per-request retry state.
#[derive(Debug)]
pub struct RetryState {
    max_attempts: u32,
    max_rate_limit_retries: Option<u32>,
    attempts: u32,
    rate_limit_hits: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            max_rate_limit_retries: policy.max_rate_limit_retries,
            attempts: 0,
            rate_limit_hits: 0,
            delay: policy.base_delay,
        }
    }

    /// 1-based number of the attempt about to be made.
    pub fn attempt(&self) -> u32 {
        self.attempts + 1
    }

    pub fn rate_limit_hits(&self) -> u32 {
        self.rate_limit_hits
    }

    /// Consume an attempt. Returns how long to wait before the next one, or
    /// `None` once every attempt is spent.
    pub fn on_failure(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            return None;
        }
        let wait = self.delay;
        self.delay = self.delay.saturating_mul(2);
        Some(wait)
    }

    /// Record a 429. Returns the extended wait without consuming an attempt,
    /// or `None` when a configured cap is exceeded.
    pub fn on_rate_limited(&mut self) -> Option<Duration> {
        self.rate_limit_hits += 1;
        if let Some(cap) = self.max_rate_limit_retries {
            if self.rate_limit_hits > cap {
                return None;
            }
        }
        let wait = self.delay.saturating_mul(2);
        self.delay = wait;
        Some(wait)
    }
}
