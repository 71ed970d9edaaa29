//! Response cache keyed by resource and parameters.
//!
//! Every read from the Web API goes through a [`QueryCache`]. Responses are
//! kept as raw JSON for the staleness window; a read inside the window is
//! served from memory, a read after it triggers a refetch. Failed fetches
//! are never cached.
//!
//! The cache lock is not held while fetching, so two concurrent misses for
//! the same key both go to the network; the later result wins.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use cached::{stores::TimedCache, Cached};
use tokio::sync::Mutex;

use crate::error::Result;

/// Identifies a cached response: a resource name and its parameters.
///
/// Parameters are kept in the order given, so callers should add them in a
/// fixed order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryKey {
    pub resource: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl QueryKey {
    #[must_use]
    pub fn new(resource: &'static str) -> Self {
        Self {
            resource,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.push((name, value.to_string()));
        self
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        for (name, value) in &self.params {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

/// A shared, time-bounded cache of JSON responses.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<TimedCache<QueryKey, serde_json::Value>>>,
    stale_time: Duration,
}

impl QueryCache {
    /// Creates a cache whose entries go stale after `stale_time`.
    ///
    /// The window has a resolution of one second and is at least one second
    /// long.
    #[must_use]
    pub fn new(stale_time: Duration) -> Self {
        let lifespan = stale_time.as_secs().max(1);
        Self {
            entries: Arc::new(Mutex::new(TimedCache::with_lifespan(lifespan))),
            stale_time,
        }
    }

    #[must_use]
    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Returns the fresh value for `key`, if any.
    pub async fn get(&self, key: &QueryKey) -> Option<serde_json::Value> {
        self.entries.lock().await.cache_get(key).cloned()
    }

    /// Returns the fresh value for `key`, or runs `fetch` and caches its
    /// result.
    ///
    /// # Errors
    ///
    /// Returns the error of `fetch`, which is not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: QueryKey, fetch: F) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>>,
    {
        if let Some(value) = self.get(&key).await {
            debug!("cache hit: {key}");
            return Ok(value);
        }

        debug!("cache miss: {key}");
        let value = fetch().await?;
        self.entries.lock().await.cache_set(key, value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self, key: &QueryKey) {
        self.entries.lock().await.cache_remove(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.cache_clear();
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("stale_time", &self.stale_time)
            .finish_non_exhaustive()
    }
}
