//! Connection pooling shared by every HTTP client the FPL client opens:
//! concurrency ceilings, a DNS cache, and the common client settings.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::HeaderMap;
use reqwest::Client;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use super::error::{ApiError, ApiResult};

pub const MAX_CONNECTIONS: usize = 10;
pub const MAX_CONNECTIONS_PER_HOST: usize = 5;
pub const DNS_CACHE_TTL: Duration = Duration::from_secs(300);
pub const USER_AGENT: &str = "FPL-Bot/1.0";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Bounds in-flight requests globally and per host.
#[derive(Debug)]
pub struct RequestLimiter {
    total: Arc<Semaphore>,
    per_host_limit: usize,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// Held for the duration of one HTTP exchange.
#[derive(Debug)]
pub struct RequestPermit {
    _host: OwnedSemaphorePermit,
    _total: OwnedSemaphorePermit,
}

impl RequestLimiter {
    pub fn new(total: usize, per_host: usize) -> Self {
        Self {
            total: Arc::new(Semaphore::new(total)),
            per_host_limit: per_host,
            per_host: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, host: &str) -> ApiResult<RequestPermit> {
        let host_semaphore = {
            let mut map = self.per_host.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(host.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
                .clone()
        };

        // Host permit first so a saturated host does not hold global slots
        let host_permit = host_semaphore
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Transport("connection pool closed".to_string()))?;
        let total_permit = self
            .total
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Transport("connection pool closed".to_string()))?;

        Ok(RequestPermit {
            _host: host_permit,
            _total: total_permit,
        })
    }

    pub fn available(&self) -> usize {
        self.total.available_permits()
    }
}

/// Resolver that remembers lookups for a fixed interval.
#[derive(Debug, Clone)]
pub struct CachingResolver {
    ttl: Duration,
    cache: Arc<Mutex<HashMap<String, (Instant, Vec<SocketAddr>)>>>,
}

impl CachingResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn cached(&self, host: &str) -> Option<Vec<SocketAddr>> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache
            .get(host)
            .filter(|(resolved_at, _)| resolved_at.elapsed() < self.ttl)
            .map(|(_, addrs)| addrs.clone())
    }

    fn store(&self, host: String, addrs: Vec<SocketAddr>) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(host, (Instant::now(), addrs));
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        let host = name.as_str().to_string();

        Box::pin(async move {
            if let Some(addrs) = resolver.cached(&host) {
                return Ok(Box::new(addrs.into_iter()) as Addrs);
            }

            let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((host.as_str(), 0)).await {
                Ok(found) => found.collect(),
                Err(e) => return Err(Box::new(e) as BoxError),
            };
            debug!(host = %host, count = addrs.len(), "Resolved host");

            resolver.store(host, addrs.clone());
            Ok(Box::new(addrs.into_iter()) as Addrs)
        })
    }
}

/// Shared resources behind every client connection set.
#[derive(Debug)]
pub struct ConnectionPool {
    limiter: RequestLimiter,
    resolver: Arc<CachingResolver>,
    timeout: Duration,
}

impl ConnectionPool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            limiter: RequestLimiter::new(MAX_CONNECTIONS, MAX_CONNECTIONS_PER_HOST),
            resolver: Arc::new(CachingResolver::new(DNS_CACHE_TTL)),
            timeout,
        }
    }

    /// Open a pooled HTTP client carrying `headers` on every request.
    pub fn open(&self, headers: HeaderMap) -> ApiResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(MAX_CONNECTIONS_PER_HOST)
            .default_headers(headers)
            .dns_resolver(self.resolver.clone())
            .build()
            .map_err(ApiError::from)
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limiter_bounds_total_permits() {
        let limiter = RequestLimiter::new(2, 5);

        let a = limiter.acquire("a.example").await.unwrap();
        let _b = limiter.acquire("b.example").await.unwrap();
        assert_eq!(limiter.available(), 0);

        drop(a);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_limiter_bounds_per_host() {
        let limiter = RequestLimiter::new(10, 1);

        let held = limiter.acquire("fpl.example").await.unwrap();
        let blocked = tokio::time::timeout(
            Duration::from_millis(20),
            limiter.acquire("fpl.example"),
        )
        .await;
        assert!(blocked.is_err());

        // Another host is unaffected
        assert!(limiter.acquire("other.example").await.is_ok());
        drop(held);
        assert!(limiter.acquire("fpl.example").await.is_ok());
    }

    #[test]
    fn test_resolver_cache_expires() {
        let resolver = CachingResolver::new(Duration::from_secs(300));
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        resolver.store("fpl.example".to_string(), vec![addr]);
        assert_eq!(resolver.cached("fpl.example"), Some(vec![addr]));

        let expired = CachingResolver::new(Duration::ZERO);
        expired.store("fpl.example".to_string(), vec![addr]);
        assert_eq!(expired.cached("fpl.example"), None);
    }
}
