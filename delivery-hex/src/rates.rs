//! Cache-through rate lookup.

use std::sync::Arc;
use std::time::Duration;

use delivery_types::{Rate, RateCache, RateError, RateProvider};

/// Default lifetime of a cached rate.
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(300);

/// Combines the rate cache and the rate provider.
///
/// A cache hit never touches the network. On a miss the provider is asked
/// exactly once and its answer is cached for `ttl`. Provider failures are
/// returned as-is; there is no stale fallback.
pub struct RateService {
    cache: Arc<dyn RateCache>,
    provider: Arc<dyn RateProvider>,
    ttl: Duration,
}

impl RateService {
    pub fn new(cache: Arc<dyn RateCache>, provider: Arc<dyn RateProvider>, ttl: Duration) -> Self {
        Self {
            cache,
            provider,
            ttl,
        }
    }

    /// Returns the configured cache TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_current_rate(&self) -> Result<Rate, RateError> {
        if let Some(rate) = self.cache.get().await {
            tracing::debug!(rate = rate.value(), "rate cache hit");
            return Ok(rate);
        }

        tracing::debug!("rate cache miss, fetching from provider");
        let rate = self.provider.fetch().await?;
        self.cache.set(rate, self.ttl).await;

        Ok(rate)
    }
}
