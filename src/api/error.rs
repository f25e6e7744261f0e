//! Typed failures of the FPL API client.

use thiserror::Error;

/// Why a request produced no value.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status} after retries")]
    Transient { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited {hits} times, giving up")]
    RateLimited { hits: u32 },

    #[error("unauthorized after re-authentication")]
    Unauthorized,

    #[error("no credentials available to authenticate")]
    NotAuthenticated,

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("no team id configured")]
    MissingTeamId,

    #[error("could not determine the current gameweek")]
    UnknownGameweek,
}

/// Coarse failure class used for logging and by callers deciding what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TransientNetwork,
    RateLimited,
    Unauthorized,
    UnsupportedOperation,
    /// Local precondition (configuration or upstream data) not met
    Precondition,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transient { .. } | Self::Timeout | Self::Transport(_) | Self::Decode(_) => {
                ErrorKind::TransientNetwork
            }
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Unauthorized | Self::NotAuthenticated => ErrorKind::Unauthorized,
            Self::UnsupportedMethod(_) => ErrorKind::UnsupportedOperation,
            Self::MissingTeamId | Self::UnknownGameweek => ErrorKind::Precondition,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
