//! Short-lived store of search queries waiting for a language choice.
//!
//! The query is kept behind a short random key so the callback data of the
//! language buttons stays inside Telegram's 64-byte limit.

use moka::future::Cache;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Expiring query store with single-use reads.
#[derive(Clone)]
pub struct CandidateCache {
    cache: Cache<String, String>,
}

impl CandidateCache {
    /// Creates a store whose entries expire after `ttl_secs`.
    ///
    /// # Examples
    ///
    /// ```
    /// use katy_bot::imdb::CandidateCache;
    ///
    /// let cache = CandidateCache::new(15, 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Store `query` and return the key to embed in callback data.
    pub async fn insert(&self, query: impl Into<String>) -> String {
        let mut key = Uuid::new_v4().simple().to_string();
        key.truncate(8);
        self.cache.insert(key.clone(), query.into()).await;
        key
    }

    /// Remove and return the query stored under `key`.
    ///
    /// Returns `None` when the entry expired or another callback already
    /// took it.
    pub async fn take(&self, key: &str) -> Option<String> {
        let query = self.cache.remove(key).await;
        if query.is_none() {
            debug!("Pending IMDb query {key} is gone");
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_is_single_use() {
        let cache = CandidateCache::new(60, 100);
        let key = cache.insert("Jurassic World").await;

        assert!(key.len() <= 8);
        assert_eq!(cache.take(&key).await.as_deref(), Some("Jurassic World"));
        assert_eq!(cache.take(&key).await, None);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let cache = CandidateCache::new(60, 100);
        assert_eq!(cache.take("deadbeef").await, None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = CandidateCache::new(1, 100);
        let key = cache.insert("Heat").await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.take(&key).await, None);
    }

    #[tokio::test]
    async fn test_concurrent_take_has_one_winner() {
        let cache = CandidateCache::new(60, 100);
        let key = cache.insert("Alien").await;

        let (a, b) = tokio::join!(cache.take(&key), cache.take(&key));
        assert_eq!(usize::from(a.is_some()) + usize::from(b.is_some()), 1);
    }
}
