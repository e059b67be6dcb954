//! In-process key-value rate cache.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use delivery_types::{Rate, RateCache};

/// Fixed key the USD→RUB rate is stored under.
pub const USD_RUB_KEY: &str = "USD_RUB";

struct Entry {
    /// Numeric string, as an external key-value store would hold it
    value: String,
    expires_at: Instant,
}

/// Key-value rate cache with per-entry expiry.
///
/// Each `set` overwrites the single key; concurrent writers race with
/// last-write-wins semantics. Expired entries are evicted lazily on `get`.
pub struct KvRateCache {
    store: DashMap<String, Entry>,
    key: String,
}

impl Default for KvRateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl KvRateCache {
    /// Creates a cache addressed by [`USD_RUB_KEY`].
    pub fn new() -> Self {
        Self::with_key(USD_RUB_KEY)
    }

    /// Creates a cache addressed by a custom key.
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            store: DashMap::new(),
            key: key.into(),
        }
    }

    /// Returns the key this cache reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the raw stored string, ignoring expiry.
    pub fn raw_value(&self) -> Option<String> {
        self.store.get(&self.key).map(|e| e.value.clone())
    }

    /// Stores a raw string under the key.
    pub fn set_raw(&self, value: impl Into<String>, ttl: Duration) {
        self.store.insert(
            self.key.clone(),
            Entry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[async_trait]
impl RateCache for KvRateCache {
    async fn get(&self) -> Option<Rate> {
        let now = Instant::now();

        // The map guard must be released before `remove_if` touches the same shard.
        let live = self
            .store
            .get(&self.key)
            .map(|e| (e.expires_at > now).then(|| e.value.clone()));

        match live {
            None => None,
            Some(None) => {
                self.store.remove_if(&self.key, |_, e| e.expires_at <= now);
                tracing::debug!(key = %self.key, "cached rate expired");
                None
            }
            Some(Some(raw)) => match raw.parse::<Rate>() {
                Ok(rate) => Some(rate),
                Err(e) => {
                    tracing::warn!(key = %self.key, value = %raw, "ignoring unusable cached rate: {}", e);
                    None
                }
            },
        }
    }

    async fn set(&self, rate: Rate, ttl: Duration) {
        self.set_raw(rate.to_string(), ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(v: f64) -> Rate {
        Rate::new(v).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cache_is_absent() {
        let cache = KvRateCache::new();
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = KvRateCache::new();
        cache.set(rate(90.5), Duration::from_secs(300)).await;

        assert_eq!(cache.get().await, Some(rate(90.5)));
        assert_eq!(cache.raw_value().as_deref(), Some("90.5"));
        assert_eq!(cache.key(), "USD_RUB");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = KvRateCache::new();
        cache.set(rate(90.0), Duration::from_secs(300)).await;

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get().await, Some(rate(90.0)));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get().await, None);
        assert_eq!(cache.raw_value(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_value_and_resets_expiry() {
        let cache = KvRateCache::new();
        cache.set(rate(90.0), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set(rate(91.0), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get().await, Some(rate(91.0)));
    }

    #[tokio::test]
    async fn test_garbage_value_reads_as_absent() {
        let cache = KvRateCache::new();
        cache.set_raw("not-a-number", Duration::from_secs(60));
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn test_concurrent_writers_leave_one_value() {
        let cache = std::sync::Arc::new(KvRateCache::new());

        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .set(rate(80.0 + i as f64), Duration::from_secs(60))
                        .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        let value = cache.get().await.unwrap().value();
        assert!((81.0..=88.0).contains(&value));
    }
}
