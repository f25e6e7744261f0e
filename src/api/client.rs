//! FPL API client with retry, backoff and re-authentication.
//!
//! Every fetch returns `ApiResult<T>`; the `Err` arm means the value is
//! unknown, never that it is empty. Transport faults never escape as panics.

use std::time::Duration;

use reqwest::header::REFERER;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::models::{fixture_difficulty, Fixture, InjuryStatus, PlayerSnapshot, NEUTRAL_DIFFICULTY};

use super::auth::{AuthMode, AuthSession, Credentials, TRANSFERS_REFERER};
use super::error::{ApiError, ApiResult};
use super::pool::ConnectionPool;
use super::retry::{classify, Disposition, RetryPolicy, RetryState};
use super::types::*;

pub const FPL_BASE_URL: &str = "https://fantasy.premierleague.com/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`FplClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub team_id: Option<u64>,
    pub credentials: Credentials,
    /// Per-request budget; expiry takes the retry path
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: FPL_BASE_URL.to_string(),
            team_id: None,
            credentials: Credentials::None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Client for the FPL REST API.
pub struct FplClient {
    config: ApiConfig,
    pool: ConnectionPool,
    /// Anonymous connection set used for reads
    http: Client,
    /// At most one authenticated connection set. Replaced under the write
    /// lock, so readers never see a half-replaced session.
    auth: RwLock<Option<AuthSession>>,
}

impl FplClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let pool = ConnectionPool::new(config.timeout);
        let http = pool.open(Default::default())?;

        Ok(Self {
            config,
            pool,
            http,
            auth: RwLock::new(None),
        })
    }

    pub fn team_id(&self) -> Option<u64> {
        self.config.team_id
    }

    pub async fn auth_mode(&self) -> AuthMode {
        self.auth
            .read()
            .await
            .as_ref()
            .map(AuthSession::mode)
            .unwrap_or(AuthMode::Unauthenticated)
    }

    /// Close any authenticated session and open a fresh one from the configured
    /// credentials.
    pub async fn authenticate(&self) -> ApiResult<AuthMode> {
        let mut slot = self.auth.write().await;

        if let Some(old) = slot.take() {
            debug!(mode = %old.mode(), "Closing authenticated session");
            drop(old);
        }

        match AuthSession::open(&self.config.credentials, &self.pool) {
            Ok(Some(session)) => {
                let mode = session.mode();
                info!(mode = %mode, "Authenticated session opened");
                *slot = Some(session);
                Ok(mode)
            }
            Ok(None) => {
                warn!("No authentication credentials provided");
                Err(ApiError::NotAuthenticated)
            }
            Err(e) => {
                error!(error = %e, "Authentication failed");
                Err(e)
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn require_team_id(&self) -> ApiResult<u64> {
        self.config.team_id.ok_or_else(|| {
            error!("No team id configured");
            ApiError::MissingTeamId
        })
    }

    /// Connection set for a request: writes go through the authenticated
    /// session when one exists.
    async fn client_for(&self, method: &Method) -> Client {
        if *method == Method::POST {
            if let Some(session) = self.auth.read().await.as_ref() {
                return session.client().clone();
            }
        }
        self.http.clone()
    }

    /// One HTTP exchange holding a pool permit until the body is read.
    async fn exchange(
        &self,
        client: &Client,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<(StatusCode, Vec<u8>)> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let _permit = self.pool.limiter().acquire(&host).await?;
        debug!(
            method = %method,
            url = %url,
            free_slots = self.pool.limiter().available(),
            "Sending request"
        );

        let mut request = client.request(method.clone(), url);
        if let Some(body) = body {
            // Writes are submitted from the transfers page
            request = request.header(REFERER, TRANSFERS_REFERER).json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        self.request_with_retry(Method::GET, url, None).await
    }

    async fn request_with_retry<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<T> {
        if method != Method::GET && method != Method::POST {
            error!(method = %method, "Unsupported HTTP method");
            return Err(ApiError::UnsupportedMethod(method.to_string()));
        }

        let mut state = RetryState::new(&self.config.retry);

        loop {
            let client = self.client_for(&method).await;

            let failure = match self.exchange(&client, &method, url, body).await {
                Ok((status, bytes)) => match classify(status, &method) {
                    Disposition::Success => match serde_json::from_slice(&bytes) {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            warn!(url = %url, error = %e, "Failed to decode response");
                            ApiError::Decode(e.to_string())
                        }
                    },
                    Disposition::RateLimited => match state.on_rate_limited() {
                        Some(wait) => {
                            warn!(
                                url = %url,
                                wait_ms = wait.as_millis() as u64,
                                hits = state.rate_limit_hits(),
                                "Rate limited, backing off"
                            );
                            tokio::time::sleep(wait).await;
                            continue;
                        }
                        None => {
                            error!(url = %url, hits = state.rate_limit_hits(), "Rate limit retries exhausted");
                            return Err(ApiError::RateLimited {
                                hits: state.rate_limit_hits(),
                            });
                        }
                    },
                    Disposition::Reauthenticate => {
                        return self.reauthenticate_and_replay(&method, url, body).await;
                    }
                    Disposition::Retry => {
                        error!(status = status.as_u16(), url = %url, "HTTP error");
                        ApiError::Transient {
                            status: status.as_u16(),
                        }
                    }
                },
                Err(e) => {
                    warn!(attempt = state.attempt(), url = %url, error = %e, "Request failed");
                    e
                }
            };

            match state.on_failure() {
                Some(wait) => tokio::time::sleep(wait).await,
                None => return Err(failure),
            }
        }
    }

    /// Handle a 401 on a write: one re-authentication, one replay.
    async fn reauthenticate_and_replay<T: DeserializeOwned>(
        &self,
        method: &Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<T> {
        warn!(url = %url, "Unauthorized, trying to re-authenticate");
        self.authenticate().await?;

        let client = self.client_for(method).await;
        let (status, bytes) = self.exchange(&client, method, url, body).await?;

        match status {
            StatusCode::OK => {
                serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => {
                error!(url = %url, "Still unauthorized after re-authentication");
                Err(ApiError::Unauthorized)
            }
            other => {
                error!(status = other.as_u16(), url = %url, "Replay after re-authentication failed");
                Err(ApiError::Transient {
                    status: other.as_u16(),
                })
            }
        }
    }

    /// Fetch /bootstrap-static/: players, clubs and gameweeks.
    pub async fn get_bootstrap_static(&self) -> ApiResult<BootstrapStatic> {
        self.get(&self.url("/bootstrap-static/")).await
    }

    /// Fetch a player's per-gameweek history.
    pub async fn get_element_summary(&self, player_id: u32) -> ApiResult<ElementSummary> {
        self.get(&self.url(&format!("/element-summary/{}/", player_id)))
            .await
    }

    pub async fn get_fixtures(&self) -> ApiResult<Vec<Fixture>> {
        let fixtures: Vec<FixtureResponse> = self.get(&self.url("/fixtures/")).await?;
        Ok(fixtures.into_iter().map(Fixture::from).collect())
    }

    /// Fetch the configured team's entry.
    pub async fn get_entry(&self) -> ApiResult<EntryResponse> {
        let team_id = self.require_team_id()?;
        self.get(&self.url(&format!("/entry/{}/", team_id))).await
    }

    /// Fetch the configured team's picks for `gameweek`, or for the current
    /// gameweek when `None`.
    pub async fn get_picks(&self, gameweek: Option<u32>) -> ApiResult<PicksResponse> {
        let team_id = self.require_team_id()?;

        let gameweek = match gameweek {
            Some(gw) => gw,
            None => match self.get_bootstrap_static().await {
                Ok(bootstrap) => bootstrap.current_gameweek().ok_or_else(|| {
                    error!("Could not determine current gameweek");
                    ApiError::UnknownGameweek
                })?,
                Err(e) => {
                    error!(error = %e, "Could not determine current gameweek");
                    return Err(ApiError::UnknownGameweek);
                }
            },
        };

        self.get(&self.url(&format!("/entry/{}/event/{}/picks/", team_id, gameweek)))
            .await
    }

    /// Difficulty of a club's fixture in `gameweek`; neutral when fixtures are
    /// unavailable or the club does not play.
    pub async fn get_fixture_difficulty(&self, team_id: u32, gameweek: u32) -> u8 {
        match self.get_fixtures().await {
            Ok(fixtures) => fixture_difficulty(&fixtures, team_id, gameweek),
            Err(e) => {
                warn!(team_id, gameweek, error = %e, "Fixtures unavailable, using neutral difficulty");
                NEUTRAL_DIFFICULTY
            }
        }
    }

    /// Bootstrap snapshot of a single player.
    pub async fn get_player_info(&self, player_id: u32) -> Option<PlayerSnapshot> {
        let bootstrap = self.get_bootstrap_static().await.ok()?;
        bootstrap.element(player_id)?.to_snapshot()
    }

    /// Availability report with defaults (available, 100%) for missing data.
    pub async fn get_player_injury_status(&self, player_id: u32) -> InjuryStatus {
        self.get_player_info(player_id)
            .await
            .map(|player| InjuryStatus::from(&player))
            .unwrap_or_default()
    }

    /// Submit transfers for `gameweek`. Returns whether the API accepted them.
    pub async fn execute_transfers(&self, gameweek: u32, transfers: &[TransferRequest]) -> bool {
        let Ok(team_id) = self.require_team_id() else {
            return false;
        };

        if self.auth_mode().await == AuthMode::Unauthenticated {
            if let Err(e) = self.authenticate().await {
                error!(error = %e, "Failed to authenticate for transfer execution");
                return false;
            }
        }

        let payload = TransferPayload::new(team_id, gameweek, transfers.to_vec());
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!(error = %e, "Failed to encode transfer payload");
                return false;
            }
        };

        let url = self.url("/transfers/");
        match self
            .request_with_retry::<serde_json::Value>(Method::POST, &url, Some(&body))
            .await
        {
            Ok(result) => {
                info!(count = transfers.len(), gameweek, result = %result, "Transfers executed");
                true
            }
            Err(e) => {
                error!(error = %e, kind = ?e.kind(), "Failed to execute transfers");
                false
            }
        }
    }
}
