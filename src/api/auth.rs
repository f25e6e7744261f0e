//! Authentication for write operations.
//!
//! Two mutually exclusive modes: session cookies copied from a logged-in
//! browser (preferred), or username/password. The full login handshake for the
//! latter is not performed; the connection is opened so writes can be attempted
//! and a 401 surfaces the missing login.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, REFERER};
use reqwest::Client;

use super::error::{ApiError, ApiResult};
use super::pool::ConnectionPool;

pub const SITE_REFERER: &str = "https://fantasy.premierleague.com/";
pub const TRANSFERS_REFERER: &str = "https://fantasy.premierleague.com/transfers";
pub const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrftoken");

/// Configured credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Session {
        session_id: String,
        csrf_token: String,
    },
    Login {
        username: String,
        password: String,
    },
    None,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session { .. } => f
                .debug_struct("Session")
                .field("session_id", &"<redacted>")
                .field("csrf_token", &"<redacted>")
                .finish(),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

impl Credentials {
    /// Pick the credential variant from optional settings. Session cookies win
    /// when both pairs are complete; blank values count as absent.
    pub fn resolve(
        session_id: Option<String>,
        csrf_token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        match (present(session_id), present(csrf_token)) {
            (Some(session_id), Some(csrf_token)) => Self::Session {
                session_id,
                csrf_token,
            },
            _ => match (present(username), present(password)) {
                (Some(username), Some(password)) => Self::Login { username, password },
                _ => Self::None,
            },
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Session { .. } => AuthMode::Session,
            Self::Login { .. } => AuthMode::Credential,
            Self::None => AuthMode::Unauthenticated,
        }
    }
}

/// Observable authentication state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Unauthenticated,
    Session,
    Credential,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Session => write!(f, "session"),
            Self::Credential => write!(f, "credential"),
        }
    }
}

/// A dedicated authenticated connection set. Dropping it closes its pooled
/// connections.
#[derive(Debug)]
pub struct AuthSession {
    mode: AuthMode,
    client: Client,
}

impl AuthSession {
    /// Open a session for `credentials`; `Ok(None)` when nothing is configured.
    pub fn open(credentials: &Credentials, pool: &ConnectionPool) -> ApiResult<Option<Self>> {
        let headers = match credentials {
            Credentials::Session {
                session_id,
                csrf_token,
            } => session_headers(session_id, csrf_token)?,
            Credentials::Login { .. } => referer_headers(),
            Credentials::None => return Ok(None),
        };

        Ok(Some(Self {
            mode: credentials.mode(),
            client: pool.open(headers)?,
        }))
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn referer_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(SITE_REFERER));
    headers
}

/// Cookie, CSRF and Referer headers for session-based auth.
pub fn session_headers(session_id: &str, csrf_token: &str) -> ApiResult<HeaderMap> {
    let cookie = HeaderValue::from_str(&format!(
        "sessionid={}; csrftoken={}",
        session_id, csrf_token
    ))
    .map_err(|_| ApiError::NotAuthenticated)?;
    let csrf = HeaderValue::from_str(csrf_token).map_err(|_| ApiError::NotAuthenticated)?;

    let mut headers = referer_headers();
    headers.insert(COOKIE, cookie);
    headers.insert(X_CSRF_TOKEN, csrf);
    Ok(headers)
}
