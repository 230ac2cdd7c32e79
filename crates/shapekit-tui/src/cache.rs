//! Small query cache for the read-only panels.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

pub const NFTS_STALE: Duration = Duration::from_secs(5 * 60);
pub const STATUS_STALE: Duration = Duration::from_secs(30);
pub const BALANCE_STALE: Duration = Duration::from_secs(30);

pub const STATUS_REFETCH: Duration = Duration::from_secs(5 * 60);
pub const BALANCE_REFETCH: Duration = Duration::from_secs(30);

/// Reads are retried this many times after the first failure. Mutations never are.
pub const READ_RETRIES: u32 = 2;

pub struct QueryCache<V> {
    stale_after: Duration,
    entries: HashMap<String, (Instant, V)>,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            entries: HashMap::new(),
        }
    }

    /// Cached value, if it is younger than the staleness window.
    pub fn fresh(&self, key: &str) -> Option<V> {
        self.fresh_at(key, Instant::now())
    }

    fn fresh_at(&self, key: &str, now: Instant) -> Option<V> {
        self.entries
            .get(key)
            .filter(|(at, _)| now.duration_since(*at) < self.stale_after)
            .map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: &str, value: V) {
        self.entries.insert(key.to_string(), (Instant::now(), value));
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Run `query`, retrying up to `retries` more times with exponential backoff from `base_delay`.
pub async fn with_retry<T, E, F, Fut>(retries: u32, base_delay: Duration, mut query: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match query().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries => {
                let delay = base_delay * 2u32.pow(attempt);
                tracing::debug!(attempt, "read failed, retrying in {:?}: {}", delay, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
