//! Time-expiring memo of fetched result records
//!
//! Guarantees at most one upstream fetch per identity within the TTL window.
//! Entries expire lazily. On overflow the entry inserted longest ago is
//! evicted; reads never reorder entries.

use crate::config::{get_result_cache_max_size, get_result_cache_ttl_secs};
use crate::model::{Region, ResultRecord};
use moka::future::Cache;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Identity a record is cached under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    region: Region,
    registration: String,
    first_name: String,
}

impl CacheKey {
    /// Build a key; the first name is normalized to trimmed lowercase.
    #[must_use]
    pub fn new(region: Region, registration: &str, first_name: &str) -> Self {
        Self {
            region,
            registration: registration.trim().to_string(),
            first_name: first_name.trim().to_lowercase(),
        }
    }

    /// Region of the lookup
    #[must_use]
    pub const fn region(&self) -> Region {
        self.region
    }

    /// Registration number
    #[must_use]
    pub fn registration(&self) -> &str {
        &self.registration
    }

    /// Normalized first name
    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }
}

/// Bounded TTL cache of result records, safe for concurrent use
#[derive(Clone)]
pub struct ResultCache {
    cache: Cache<CacheKey, Arc<ResultRecord>>,
    /// Keys in insertion order, oldest at the front
    insertions: Arc<Mutex<VecDeque<CacheKey>>>,
    capacity: u64,
}

impl ResultCache {
    /// Creates a cache with the given TTL and capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use exam_result_core::cache::ResultCache;
    /// use std::time::Duration;
    ///
    /// let cache = ResultCache::new(Duration::from_secs(3600), 100);
    /// assert_eq!(cache.capacity(), 100);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().time_to_live(ttl).build();

        Self {
            cache,
            insertions: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    /// Creates a cache using `RESULT_CACHE_TTL_SECS` / `RESULT_CACHE_MAX_SIZE` or their defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            Duration::from_secs(get_result_cache_ttl_secs()),
            get_result_cache_max_size(),
        )
    }

    /// Returns the record if present and not older than the TTL
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<ResultRecord>> {
        self.cache.get(key).await
    }

    /// Inserts or overwrites a record, resetting its age.
    ///
    /// An overwritten key moves to the back of the insertion order. Keys that
    /// already expired stay queued until they reach the front, which is where
    /// they would be evicted first anyway.
    pub async fn put(&self, key: CacheKey, record: Arc<ResultRecord>) {
        debug!(region = %key.region, "Caching result record");
        let mut insertions = self.insertions.lock().await;
        insertions.retain(|queued| queued != &key);
        insertions.push_back(key.clone());
        self.cache.insert(key, record).await;

        while u64::try_from(insertions.len()).unwrap_or(u64::MAX) > self.capacity {
            let Some(oldest) = insertions.pop_front() else {
                break;
            };
            debug!(region = %oldest.region, "Evicting oldest cached record");
            self.cache.invalidate(&oldest).await;
        }
        self.cache.run_pending_tasks().await;
    }

    /// Number of live entries
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Configured capacity
    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Student;

    fn record(name: &str) -> Arc<ResultRecord> {
        Arc::new(ResultRecord {
            student: Student {
                name: Some(name.to_string()),
                ..Student::default()
            },
            courses: Vec::new(),
        })
    }

    #[test]
    fn test_key_normalizes_first_name() {
        let a = CacheKey::new(Region::Amhara, "123456", "  Abel ");
        let b = CacheKey::new(Region::Amhara, "123456", "abel");
        assert_eq!(a, b);
        assert_eq!(a.first_name(), "abel");
        assert_ne!(a, CacheKey::new(Region::Oromia, "123456", "abel"));
    }

    #[tokio::test]
    async fn test_hit_returns_same_record() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        let key = CacheKey::new(Region::Aa, "1234567", "Sara");
        let stored = record("Sara");

        cache.put(key.clone(), stored.clone()).await;

        let hit = cache.get(&key).await;
        assert!(hit.is_some_and(|r| Arc::ptr_eq(&r, &stored)));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = ResultCache::new(Duration::from_millis(50), 10);
        let key = CacheKey::new(Region::Sw, "1234567", "sara");
        cache.put(key.clone(), record("Sara")).await;

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        let key = CacheKey::new(Region::Aa, "1234567", "sara");
        cache.put(key.clone(), record("old")).await;
        cache.put(key.clone(), record("new")).await;

        let hit = cache.get(&key).await;
        assert_eq!(
            hit.and_then(|r| r.student.name.clone()).as_deref(),
            Some("new")
        );
        assert_eq!(cache.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_entry() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        let first = CacheKey::new(Region::Aa, "1000001", "a");
        let second = CacheKey::new(Region::Aa, "1000002", "b");
        let third = CacheKey::new(Region::Aa, "1000003", "c");

        cache.put(first.clone(), record("a")).await;
        cache.put(second.clone(), record("b")).await;
        cache.put(third.clone(), record("c")).await;

        assert!(cache.entry_count() <= 2);
        assert!(cache.get(&first).await.is_none());
        assert!(cache.get(&third).await.is_some());
    }

    #[tokio::test]
    async fn test_reads_do_not_save_oldest_entry_from_eviction() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        let first = CacheKey::new(Region::Aa, "1000001", "a");
        let second = CacheKey::new(Region::Aa, "1000002", "b");
        let third = CacheKey::new(Region::Aa, "1000003", "c");

        cache.put(first.clone(), record("a")).await;
        cache.put(second.clone(), record("b")).await;
        assert!(cache.get(&first).await.is_some());
        cache.put(third.clone(), record("c")).await;

        assert!(cache.get(&first).await.is_none());
        assert!(cache.get(&second).await.is_some());
        assert!(cache.get(&third).await.is_some());
    }

    #[tokio::test]
    async fn test_overwrite_moves_key_to_newest() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        let first = CacheKey::new(Region::Aa, "1000001", "a");
        let second = CacheKey::new(Region::Aa, "1000002", "b");
        let third = CacheKey::new(Region::Aa, "1000003", "c");

        cache.put(first.clone(), record("a")).await;
        cache.put(second.clone(), record("b")).await;
        cache.put(first.clone(), record("a2")).await;
        cache.put(third.clone(), record("c")).await;

        assert!(cache.get(&second).await.is_none());
        assert_eq!(
            cache
                .get(&first)
                .await
                .and_then(|r| r.student.name.clone())
                .as_deref(),
            Some("a2")
        );
        assert!(cache.get(&third).await.is_some());
    }
}
